mod settings;

pub use settings::{
    AppSettings, PortRule, ProvisionSettings, ReadinessSettings, Settings, SiteSettings,
    SshSettings,
};
