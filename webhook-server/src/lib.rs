#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod admission;
mod args;
pub mod review;

pub use self::{
    admission::{Admission, Error, INVALID_POD_NAME},
    args::Args,
};
