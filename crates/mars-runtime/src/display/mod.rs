//! Terminal rendering for debate progress and reports.

mod renderer;

pub use renderer::Renderer;
