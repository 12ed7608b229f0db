//! Intent DTOs - request bodies for the mutation endpoints

mod dto;

pub use dto::{
    AddItemInput, FinalizeInput, OpenTableInput, PaymentInput, SetQuantityInput,
};
