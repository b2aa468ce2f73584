/// Addressable resource-list views. `Cluster` is the root of the drill-down graph.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PrimaryKind {
    Cluster,
    Service,
    Task,
    Container,
    TaskDefinition,
    Instance,
    Deployment,
    Help,
}

/// Transient overlays shown on top of a primary page.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SecondaryKind {
    Empty,
    Description,
    EventList,
    LogList,
    AutoScaling,
    Revision,
    Modal,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct KeyHint {
    pub key: &'static str,
    pub label: &'static str,
}

impl PrimaryKind {
    pub const ROOT: Self = Self::Cluster;

    #[cfg(test)]
    pub const ALL: [Self; 8] = [
        Self::Cluster,
        Self::Service,
        Self::Task,
        Self::Container,
        Self::TaskDefinition,
        Self::Instance,
        Self::Deployment,
        Self::Help,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Cluster => "clusters",
            Self::Service => "services",
            Self::Task => "tasks",
            Self::Container => "containers",
            Self::TaskDefinition => "task definitions",
            Self::Instance => "instances",
            Self::Deployment => "deployments",
            Self::Help => "help",
        }
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }

    pub fn next(self) -> Self {
        match self {
            Self::Cluster => Self::Service,
            Self::Service => Self::Task,
            Self::Task => Self::Container,
            _ => Self::ROOT,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Self::Cluster => Self::Cluster,
            Self::Service => Self::Cluster,
            Self::Task => Self::Service,
            Self::Container => Self::Task,
            Self::TaskDefinition => Self::Task,
            Self::Instance => Self::Cluster,
            Self::Deployment => Self::Service,
            Self::Help => Self::Cluster,
        }
    }

    /// Kinds whose Enter key drills further down instead of opening a description.
    pub fn has_children(self) -> bool {
        matches!(self, Self::Cluster | Self::Service | Self::Task)
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "cluster" | "clusters" | "cl" => Some(Self::Cluster),
            "service" | "services" | "svc" => Some(Self::Service),
            "task" | "tasks" => Some(Self::Task),
            "container" | "containers" | "co" => Some(Self::Container),
            "taskdefinition" | "taskdefinitions" | "task-definitions" | "td" => {
                Some(Self::TaskDefinition)
            }
            "instance" | "instances" | "ci" => Some(Self::Instance),
            "deployment" | "deployments" | "dp" => Some(Self::Deployment),
            "help" | "?" => Some(Self::Help),
            _ => None,
        }
    }

    pub fn supported_secondaries(self) -> &'static [SecondaryKind] {
        use SecondaryKind::*;
        match self {
            Self::Cluster => &[Description],
            Self::Service => &[Description, EventList, LogList, AutoScaling, Revision, Modal],
            Self::Task => &[Description, LogList, Modal],
            Self::Container => &[Description, LogList, Modal],
            Self::TaskDefinition => &[Description, Revision],
            Self::Instance | Self::Deployment => &[Description],
            Self::Help => &[],
        }
    }

    pub fn supports(self, secondary: SecondaryKind) -> bool {
        secondary == SecondaryKind::Empty || self.supported_secondaries().contains(&secondary)
    }

    pub fn hints(self) -> &'static [KeyHint] {
        match self {
            Self::Cluster => &[
                KeyHint { key: "enter", label: "services" },
                KeyHint { key: "d", label: "describe" },
                KeyHint { key: "m", label: "metrics" },
                KeyHint { key: "i", label: "instances" },
            ],
            Self::Service => &[
                KeyHint { key: "enter", label: "tasks" },
                KeyHint { key: "d", label: "describe" },
                KeyHint { key: "w", label: "events" },
                KeyHint { key: "l", label: "logs" },
                KeyHint { key: "L", label: "tail" },
                KeyHint { key: "m", label: "metrics" },
                KeyHint { key: "a", label: "autoscaling" },
                KeyHint { key: "r", label: "revisions" },
                KeyHint { key: "t", label: "task def" },
                KeyHint { key: "D", label: "deployments" },
                KeyHint { key: "U", label: "update" },
            ],
            Self::Task => &[
                KeyHint { key: "enter", label: "containers" },
                KeyHint { key: "d", label: "describe" },
                KeyHint { key: "l", label: "logs" },
                KeyHint { key: "L", label: "tail" },
                KeyHint { key: "t", label: "task def" },
                KeyHint { key: "S", label: "stop" },
            ],
            Self::Container => &[
                KeyHint { key: "enter", label: "describe" },
                KeyHint { key: "l", label: "logs" },
                KeyHint { key: "L", label: "tail" },
                KeyHint { key: "s", label: "shell" },
                KeyHint { key: "F", label: "port forward" },
                KeyHint { key: "T", label: "end forwards" },
            ],
            Self::TaskDefinition => &[
                KeyHint { key: "enter", label: "describe" },
                KeyHint { key: "r", label: "diff previous" },
                KeyHint { key: "E", label: "edit & register" },
            ],
            Self::Instance | Self::Deployment => &[KeyHint { key: "enter", label: "describe" }],
            Self::Help => &[],
        }
    }
}

impl SecondaryKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Description => "description",
            Self::EventList => "events",
            Self::LogList => "logs",
            Self::AutoScaling => "autoscaling",
            Self::Revision => "revisions",
            Self::Modal => "modal",
        }
    }
}

/// Address of a cached page.
///
/// Segments are joined with `.`; a literal `.`, `~` or `\` inside a segment is
/// escaped with `\`. The root kind has one segment and every other kind two
/// (kind, parent), with a missing parent written as a bare `~`, so keys from
/// different tuples cannot collide. An overlay
/// appends the owning entity name and its secondary kind. An `Empty` overlay
/// addresses the owning primary page itself.
pub fn page_key(
    kind: PrimaryKind,
    parent: Option<&str>,
    overlay: Option<(&str, SecondaryKind)>,
) -> String {
    let mut segments = vec![escape_segment(kind.title())];
    if !kind.is_root() {
        segments.push(parent.map_or_else(|| "~".to_string(), escape_segment));
    }
    if let Some((entity, secondary)) = overlay
        && secondary != SecondaryKind::Empty
    {
        segments.push(escape_segment(entity));
        segments.push(escape_segment(secondary.title()));
    }
    segments.join(".")
}

fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for ch in segment.chars() {
        if matches!(ch, '.' | '~' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{PrimaryKind, SecondaryKind, page_key};
    use std::collections::HashSet;

    #[test]
    fn previous_of_root_is_root() {
        assert_eq!(PrimaryKind::ROOT.previous(), PrimaryKind::ROOT);
    }

    #[test]
    fn drill_down_chain_walks_back_to_root() {
        let mut kind = PrimaryKind::ROOT;
        for expected in [
            PrimaryKind::Service,
            PrimaryKind::Task,
            PrimaryKind::Container,
        ] {
            kind = kind.next();
            assert_eq!(kind, expected);
        }
        assert_eq!(kind.next(), PrimaryKind::ROOT);
        assert_eq!(kind.previous().previous().previous(), PrimaryKind::ROOT);
    }

    #[test]
    fn every_kind_eventually_reaches_root() {
        for kind in PrimaryKind::ALL {
            let mut current = kind;
            for _ in 0..PrimaryKind::ALL.len() {
                current = current.previous();
            }
            assert_eq!(current, PrimaryKind::ROOT, "{kind:?} never reached root");
        }
    }

    #[test]
    fn page_key_is_stable_for_the_same_tuple() {
        let first = page_key(PrimaryKind::Task, Some("arn:svc/web"), None);
        let second = page_key(PrimaryKind::Task, Some("arn:svc/web"), None);
        assert_eq!(first, second);
        assert_eq!(page_key(PrimaryKind::Cluster, None, None), "clusters");
    }

    #[test]
    fn page_key_does_not_collide_across_tuples() {
        let tuples: Vec<(PrimaryKind, Option<&str>, Option<(&str, SecondaryKind)>)> = vec![
            (PrimaryKind::Cluster, None, None),
            (PrimaryKind::Cluster, None, Some(("a", SecondaryKind::Description))),
            (PrimaryKind::Service, Some("a"), None),
            (PrimaryKind::Service, Some("a.b"), None),
            (PrimaryKind::Service, Some("a"), Some(("b", SecondaryKind::Description))),
            (PrimaryKind::Service, Some("a.b"), Some(("description", SecondaryKind::LogList))),
            (PrimaryKind::Service, Some("a\\"), Some(("b", SecondaryKind::Description))),
            (PrimaryKind::Task, Some("a"), None),
            (PrimaryKind::Task, Some("a"), Some(("x", SecondaryKind::LogList))),
            (PrimaryKind::Task, Some("a"), Some(("x", SecondaryKind::Modal))),
            (PrimaryKind::Container, None, None),
            (PrimaryKind::Container, Some(""), Some(("", SecondaryKind::Description))),
        ];

        let keys = tuples
            .iter()
            .map(|(kind, parent, overlay)| page_key(*kind, *parent, *overlay))
            .collect::<HashSet<_>>();
        assert_eq!(keys.len(), tuples.len());
        assert!(keys.contains("services.a\\.b"));
    }

    #[test]
    fn every_kind_has_key_hints() {
        for kind in PrimaryKind::ALL {
            assert_eq!(kind.hints().is_empty(), kind == PrimaryKind::Help, "{kind:?}");
        }
        let service = PrimaryKind::Service.hints();
        assert_eq!(service[0].key, "enter");
        assert!(service.iter().any(|hint| hint.label == "deployments"));
    }

    #[test]
    fn missing_parent_differs_from_an_empty_one() {
        let missing = page_key(PrimaryKind::Container, None, None);
        let empty = page_key(PrimaryKind::Container, Some(""), None);
        let tilde = page_key(PrimaryKind::Container, Some("~"), None);
        assert_eq!(missing, "containers.~");
        assert_eq!(empty, "containers.");
        assert_eq!(tilde, "containers.\\~");
    }

    #[test]
    fn empty_overlay_addresses_the_owning_page() {
        assert_eq!(
            page_key(PrimaryKind::Service, Some("c"), Some(("s", SecondaryKind::Empty))),
            page_key(PrimaryKind::Service, Some("c"), None)
        );
    }

    #[test]
    fn only_declared_overlays_are_supported() {
        assert!(PrimaryKind::Service.supports(SecondaryKind::AutoScaling));
        assert!(!PrimaryKind::Cluster.supports(SecondaryKind::LogList));
        assert!(!PrimaryKind::Help.supports(SecondaryKind::Description));
        assert!(PrimaryKind::Help.supports(SecondaryKind::Empty));
    }

    #[test]
    fn tokens_resolve_to_kinds() {
        assert_eq!(PrimaryKind::from_token("svc"), Some(PrimaryKind::Service));
        assert_eq!(PrimaryKind::from_token("TD"), Some(PrimaryKind::TaskDefinition));
        assert_eq!(PrimaryKind::from_token("nope"), None);
    }
}
