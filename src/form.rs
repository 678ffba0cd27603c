//! Form field parsing for submit events

use crate::types::{BackgroundColor, BackgroundMode, Submission, UploadedFile};

/// Field names understood by [`Submission::from_form`]
pub mod fields {
    pub const FILE: &str = "file";
    pub const REMOVE_BG: &str = "remove_bg";
    pub const BACKGROUND_OPTION: &str = "background_option";
    pub const BACKGROUND_COLOR: &str = "background_color";
    pub const BACKGROUND_FILE: &str = "background_file";
}

/// A single form value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(UploadedFile),
}

impl FormValue {
    fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::File(_) => None,
        }
    }

    fn into_file(self) -> Option<UploadedFile> {
        match self {
            Self::File(file) => Some(file),
            Self::Text(_) => None,
        }
    }
}

/// Ordered multi-map of form entries; lookups return the first value for a name
#[derive(Debug, Clone, Default)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_text<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.entries
            .push((name.into(), FormValue::Text(value.into())));
    }

    pub fn append_file<N: Into<String>>(&mut self, name: N, file: UploadedFile) {
        self.entries.push((name.into(), FormValue::File(file)));
    }

    #[must_use]
    pub fn with_text<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.append_text(name, value);
        self
    }

    #[must_use]
    pub fn with_file<N: Into<String>>(mut self, name: N, file: UploadedFile) -> Self {
        self.append_file(name, file);
        self
    }

    /// First value stored under `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FormValue::as_text)
    }

    fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        self.entries.remove(index).1.into_file()
    }
}

impl Submission {
    /// Build a submission from form fields.
    ///
    /// Missing values fall back to the form defaults: background option
    /// `transparent` and color `#ffffff`. The remove-background checkbox is
    /// set only when its value is exactly `"on"`. No validation happens here;
    /// a missing file is reported when the submission is processed.
    #[must_use]
    pub fn from_form(mut form: FormData) -> Self {
        let remove_bg = form.text(fields::REMOVE_BG) == Some("on");

        let background = match form
            .text(fields::BACKGROUND_OPTION)
            .filter(|value| !value.is_empty())
        {
            None => BackgroundMode::Transparent,
            Some(value) => BackgroundMode::parse(value).unwrap_or_else(|| {
                tracing::warn!(option = value, "Unknown background option, leaving canvas transparent");
                BackgroundMode::Transparent
            }),
        };

        let background_color = form
            .text(fields::BACKGROUND_COLOR)
            .filter(|value| !value.is_empty())
            .map(BackgroundColor::new)
            .unwrap_or_default();

        let file = form.take_file(fields::FILE);
        let background_file = form.take_file(fields::BACKGROUND_FILE);

        Self {
            file,
            remove_bg,
            background,
            background_color,
            background_file,
        }
    }
}
