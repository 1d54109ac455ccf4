mod handler;
mod model;

pub use handler::{generate_workout, generation_status};
pub use model::{GenerateWorkoutResponse, GenerationStatusResponse, IDEMPOTENCY_KEY_HEADER};
