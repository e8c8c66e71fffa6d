//! Device workers
//!
//! Each worker is an `async fn` on [`crate::Epdc`] that loops forever. Run
//! them as separate executor tasks or together through `Epdc::run`.

mod bottom_half;
mod power;
mod submit;
