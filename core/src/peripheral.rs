use std::fmt;

/// A remote Bluetooth device as seen by observers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeripheralIdentifier {
    pub uuid: String,
    pub name: Option<String>,
}

impl PeripheralIdentifier {
    pub fn new(uuid: impl Into<String>, name: Option<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name,
        }
    }

    pub fn description(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uuid)
    }
}

impl fmt::Display for PeripheralIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefers_name() {
        let named = PeripheralIdentifier::new("6E400001", Some("Heart Rate Strap".to_string()));
        assert_eq!(named.to_string(), "Heart Rate Strap");

        let anonymous = PeripheralIdentifier::new("6E400001", None);
        assert_eq!(anonymous.to_string(), "6E400001");
    }

    #[test]
    fn test_equality_includes_name() {
        let a = PeripheralIdentifier::new("6E400001", None);
        let b = PeripheralIdentifier::new("6E400001", Some("Strap".to_string()));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
