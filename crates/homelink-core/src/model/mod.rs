// ── Domain model ──

pub mod activity;
pub mod automation;
pub mod device;
pub mod user;

pub use activity::ActivityEntry;
pub use automation::{Automation, AutomationKind};
pub use device::{Device, DeviceKind, DevicePatch, Room};
pub use user::UserProfile;
