use chrono::{DateTime, Local};
use std::collections::HashMap;
use tracing::{debug, error};

use crate::form::Form;
use crate::kind::{PrimaryKind, SecondaryKind, page_key};
use crate::model::TableData;

#[derive(Debug, Clone)]
pub enum PageBody {
    Table(TableData),
    Text(String),
    Form(Form),
}

#[derive(Debug, Clone)]
pub struct Page {
    pub kind: PrimaryKind,
    pub secondary: SecondaryKind,
    pub parent: Option<String>,
    pub title: String,
    /// Label/value pairs describing the resource that owns this page.
    pub header: Vec<(String, String)>,
    pub body: PageBody,
    pub built_at: DateTime<Local>,
}

impl Page {
    pub fn table(&self) -> Option<&TableData> {
        match &self.body {
            PageBody::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn table_mut(&mut self) -> Option<&mut TableData> {
        match &mut self.body {
            PageBody::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn form(&self) -> Option<&Form> {
        match &self.body {
            PageBody::Form(form) => Some(form),
            _ => None,
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut Form> {
        match &mut self.body {
            PageBody::Form(form) => Some(form),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Navigation {
    Reuse,
    Rebuild,
}

/// Built pages keyed by [`page_key`], plus which one is on screen.
#[derive(Debug, Default)]
pub struct PageStore {
    pages: HashMap<String, Page>,
    visible: Option<String>,
}

impl PageStore {
    pub fn has_page(&self, key: &str) -> bool {
        self.pages.contains_key(key)
    }

    /// Registers or replaces the page; it becomes the visible one.
    pub fn add_page(&mut self, key: String, page: Page) {
        debug!(key = %key, "page built");
        self.pages.insert(key.clone(), page);
        self.visible = Some(key);
    }

    /// Shows an already built page. Unknown keys are a caller bug and leave the
    /// visible page unchanged.
    pub fn switch_to(&mut self, key: &str) -> bool {
        if !self.pages.contains_key(key) {
            error!(key = %key, "switch requested for a page that was never built");
            return false;
        }
        self.visible = Some(key.to_string());
        true
    }

    pub fn resolve_navigation(
        &self,
        kind: PrimaryKind,
        parent: Option<&str>,
        reload: bool,
        refresh_enabled: bool,
    ) -> Navigation {
        let key = page_key(kind, parent, None);
        if self.has_page(&key) && !refresh_enabled && !reload {
            Navigation::Reuse
        } else {
            Navigation::Rebuild
        }
    }

    pub fn visible_key(&self) -> Option<&str> {
        self.visible.as_deref()
    }

    pub fn visible(&self) -> Option<&Page> {
        self.visible.as_ref().and_then(|key| self.pages.get(key))
    }

    pub fn get(&self, key: &str) -> Option<&Page> {
        self.pages.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Page> {
        self.pages.get_mut(key)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{Navigation, Page, PageBody, PageStore};
    use crate::kind::{PrimaryKind, SecondaryKind, page_key};
    use crate::model::TableData;
    use chrono::Local;

    fn page(kind: PrimaryKind) -> Page {
        Page {
            kind,
            secondary: SecondaryKind::Empty,
            parent: None,
            title: kind.title().to_string(),
            header: Vec::new(),
            body: PageBody::Table(TableData::default()),
            built_at: Local::now(),
        }
    }

    #[test]
    fn added_page_becomes_visible() {
        let mut store = PageStore::default();
        store.add_page("clusters".to_string(), page(PrimaryKind::Cluster));
        store.add_page("services.c1".to_string(), page(PrimaryKind::Service));
        assert_eq!(store.visible_key(), Some("services.c1"));
        assert!(store.switch_to("clusters"));
        assert_eq!(store.visible_key(), Some("clusters"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn switching_to_unknown_key_keeps_visible_page() {
        let mut store = PageStore::default();
        store.add_page("clusters".to_string(), page(PrimaryKind::Cluster));
        assert!(!store.switch_to("tasks.nope"));
        assert_eq!(store.visible_key(), Some("clusters"));
    }

    #[test]
    fn reuse_requires_existing_page_without_refresh_or_reload() {
        let mut store = PageStore::default();
        let parent = Some("arn:c1");
        assert_eq!(
            store.resolve_navigation(PrimaryKind::Service, parent, false, false),
            Navigation::Rebuild
        );

        store.add_page(
            page_key(PrimaryKind::Service, parent, None),
            page(PrimaryKind::Service),
        );
        assert_eq!(
            store.resolve_navigation(PrimaryKind::Service, parent, false, false),
            Navigation::Reuse
        );
        assert_eq!(
            store.resolve_navigation(PrimaryKind::Service, parent, true, false),
            Navigation::Rebuild
        );
        assert_eq!(
            store.resolve_navigation(PrimaryKind::Service, parent, false, true),
            Navigation::Rebuild
        );
        assert_eq!(
            store.resolve_navigation(PrimaryKind::Service, Some("arn:c2"), false, false),
            Navigation::Rebuild
        );
    }
}
