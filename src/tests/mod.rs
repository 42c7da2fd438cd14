//! Whole-crate scenarios: evaluation, production, combination and
//! archive round trips over synthetic data.
mod combine;
mod weftball;
