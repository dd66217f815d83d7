//! In-memory storage

mod memory;

pub use memory::{
    InMemoryCommandRepository, InMemoryEntityRepository, InMemoryPartyRepository,
    InMemoryPlatformRepository, InMemoryRepositoryProvider, InMemoryReservationRepository,
};
