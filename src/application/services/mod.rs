//! Application services - Business logic orchestration

pub mod command_service;
pub mod draw_service;
pub mod render;
pub mod scheduler;

pub use command_service::CommandService;
pub use draw_service::DrawService;
pub use render::Renderer;
pub use scheduler::Scheduler;
