//! Registry lookups for variable values

use thiserror::Error;

/// Registry lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry value {0} not found")]
    NotFound(String),

    #[error("Invalid registry hive '{0}'")]
    InvalidHive(String),

    #[error("Registry access is not available on this platform")]
    Unsupported,
}

/// Registry hives a query may name
pub const REGISTRY_HIVES: &[&str] = &[
    "HKEY_CLASSES_ROOT",
    "HKEY_CURRENT_USER",
    "HKEY_LOCAL_MACHINE",
    "HKEY_USERS",
    "HKEY_CURRENT_CONFIG",
    "HKEY_PERFORMANCE_DATA",
];

/// Source of registry string values
pub trait RegistrySource: Send + Sync {
    fn query(&self, hive: &str, path: &str, name: &str) -> Result<String, RegistryError>;
}

/// Registry source used where no platform registry is wired in
///
/// The hive is still validated so profile mistakes surface with a precise
/// error before the platform limitation does.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedRegistry;

impl RegistrySource for UnsupportedRegistry {
    fn query(&self, hive: &str, _path: &str, _name: &str) -> Result<String, RegistryError> {
        if !REGISTRY_HIVES.contains(&hive) {
            return Err(RegistryError::InvalidHive(hive.to_string()));
        }
        Err(RegistryError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_hive() {
        let result = UnsupportedRegistry.query("HKEY_NOPE", "a", "b");
        assert_eq!(result, Err(RegistryError::InvalidHive("HKEY_NOPE".to_string())));
    }

    #[test]
    fn test_valid_hive_unsupported() {
        let result = UnsupportedRegistry.query("HKEY_LOCAL_MACHINE", "SOFTWARE", "Path");
        assert_eq!(result, Err(RegistryError::Unsupported));
    }
}
