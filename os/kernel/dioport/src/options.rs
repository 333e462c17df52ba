use dio_abi::ConfigurationBits;
use dio_options_derive::Options;

/// Which ranges a process may be granted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AccessPolicy {
    /// Any port outside the conventional PC/AT deny-list.
    #[default]
    DenyConventional,
    /// Only ports assigned to the device at start.
    HardwareResources,
}

/// Load-time driver options.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Options)]
pub struct DriverOptions {
    pub access_policy: AccessPolicy,
    /// Register the opening process as owner on create.
    pub register_on_open: bool,
    /// Take the owner's port access away on a voluntary unregister.
    pub revoke_on_unregister: bool,
    /// Also require every port of a transferred range to be allowed in the
    /// installed permission map.
    pub enforce_permission_map: bool,
    /// Runtime configuration in effect until the first configuration write.
    pub initial_configuration: ConfigurationBits,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            access_policy: AccessPolicy::DenyConventional,
            register_on_open: false,
            revoke_on_unregister: true,
            enforce_permission_map: true,
            initial_configuration: ConfigurationBits::new(),
        }
    }
}
