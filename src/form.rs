#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FormKind {
    UpdateService,
    StopTask,
    PortForward,
    TerminateSessions,
}

impl FormKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::UpdateService => "Update service",
            Self::StopTask => "Stop task",
            Self::PortForward => "Port forward",
            Self::TerminateSessions => "Terminate port forwards",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(String),
    Choice { options: Vec<String>, index: usize },
    /// Read-only line shown inside the form.
    Note(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FormField {
    pub label: String,
    pub value: FieldValue,
}

impl FormField {
    pub fn text(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn number(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: FieldValue::Number(value.into()),
        }
    }

    pub fn choice(label: &str, options: Vec<String>, index: usize) -> Self {
        let index = index.min(options.len().saturating_sub(1));
        Self {
            label: label.to_string(),
            value: FieldValue::Choice { options, index },
        }
    }

    pub fn note(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: FieldValue::Note(value.into()),
        }
    }

    pub fn display_value(&self) -> String {
        match &self.value {
            FieldValue::Text(value) | FieldValue::Number(value) | FieldValue::Note(value) => {
                value.clone()
            }
            FieldValue::Choice { options, index } => options
                .get(*index)
                .map(|option| format!("< {option} >"))
                .unwrap_or_else(|| "-".to_string()),
        }
    }

    fn editable(&self) -> bool {
        !matches!(self.value, FieldValue::Note(_))
    }
}

/// Modal input form. Focus only lands on editable fields.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Form {
    pub kind: FormKind,
    pub fields: Vec<FormField>,
    pub focus: usize,
}

impl Form {
    pub fn new(kind: FormKind, fields: Vec<FormField>) -> Self {
        let focus = fields
            .iter()
            .position(FormField::editable)
            .unwrap_or_default();
        Self {
            kind,
            fields,
            focus,
        }
    }

    pub fn focus_next(&mut self) {
        self.move_focus(1);
    }

    pub fn focus_previous(&mut self) {
        self.move_focus(-1);
    }

    fn move_focus(&mut self, delta: isize) {
        let len = self.fields.len() as isize;
        if len == 0 {
            return;
        }
        let mut index = self.focus as isize;
        for _ in 0..len {
            index = (index + delta).rem_euclid(len);
            if self.fields[index as usize].editable() {
                self.focus = index as usize;
                return;
            }
        }
    }

    pub fn insert_char(&mut self, ch: char) {
        let Some(field) = self.fields.get_mut(self.focus) else {
            return;
        };
        match &mut field.value {
            FieldValue::Text(value) => value.push(ch),
            FieldValue::Number(value) if ch.is_ascii_digit() => value.push(ch),
            _ => {}
        }
    }

    pub fn backspace(&mut self) {
        let Some(field) = self.fields.get_mut(self.focus) else {
            return;
        };
        if let FieldValue::Text(value) | FieldValue::Number(value) = &mut field.value {
            value.pop();
        }
    }

    pub fn cycle(&mut self, delta: isize) {
        let Some(field) = self.fields.get_mut(self.focus) else {
            return;
        };
        if let FieldValue::Choice { options, index } = &mut field.value
            && !options.is_empty()
        {
            let len = options.len() as isize;
            *index = (*index as isize + delta).rem_euclid(len) as usize;
        }
    }

    fn field(&self, label: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|field| field.label == label)
            .map(|field| &field.value)
    }

    pub fn text(&self, label: &str) -> Option<&str> {
        match self.field(label)? {
            FieldValue::Text(value) | FieldValue::Number(value) => Some(value.trim()),
            _ => None,
        }
    }

    pub fn number(&self, label: &str) -> Result<i64, String> {
        let raw = self.text(label).unwrap_or_default();
        raw.parse::<i64>()
            .map_err(|_| format!("{label} must be a whole number"))
    }

    pub fn choice(&self, label: &str) -> Option<&str> {
        match self.field(label)? {
            FieldValue::Choice { options, index } => options.get(*index).map(String::as_str),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Form, FormField, FormKind};

    fn sample() -> Form {
        Form::new(
            FormKind::UpdateService,
            vec![
                FormField::note("Service", "web"),
                FormField::number("Desired count", "2"),
                FormField::choice(
                    "Force new deployment",
                    vec!["no".to_string(), "yes".to_string()],
                    0,
                ),
            ],
        )
    }

    #[test]
    fn focus_skips_read_only_fields() {
        let mut form = sample();
        assert_eq!(form.focus, 1);
        form.focus_next();
        assert_eq!(form.focus, 2);
        form.focus_next();
        assert_eq!(form.focus, 1);
        form.focus_previous();
        assert_eq!(form.focus, 2);
    }

    #[test]
    fn number_fields_only_accept_digits() {
        let mut form = sample();
        form.insert_char('x');
        form.insert_char('5');
        assert_eq!(form.number("Desired count"), Ok(25));
        form.backspace();
        form.backspace();
        assert!(form.number("Desired count").is_err());
    }

    #[test]
    fn choices_wrap_around() {
        let mut form = sample();
        form.focus_next();
        form.cycle(-1);
        assert_eq!(form.choice("Force new deployment"), Some("yes"));
        form.cycle(1);
        assert_eq!(form.choice("Force new deployment"), Some("no"));
    }
}
