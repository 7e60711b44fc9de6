pub mod app;
pub mod fields;
pub mod terminal_guard;
pub mod wizard_view;

pub use app::App;
pub use wizard_view::WizardScreen;
