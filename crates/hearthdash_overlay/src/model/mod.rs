mod device;
mod link;
mod order;
mod panel;

pub use device::Category;
pub use device::ClimateConfig;
pub use device::ClimateStates;
pub use device::Device;
pub use device::DeviceKind;
pub use device::DeviceLists;
pub use device::DevicePatch;
pub use device::SensorType;
pub use device::ShutterConfig;
pub use device::ShutterStates;
pub use link::normalize_url;
pub use link::Link;
pub use link::LinkIcon;
pub use link::LinkPatch;
pub use order::move_item;
pub use order::PageOrder;
pub use panel::ControlPanel;
pub use panel::DropdownOption;
pub use panel::OptionValue;
pub use panel::StateBinding;
pub use panel::Widget;
