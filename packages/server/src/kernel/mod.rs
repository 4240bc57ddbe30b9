//! Kernel: infrastructure under the search domain.

pub mod deps;
pub mod email;
pub mod pricing;
pub mod scheduler;
pub mod store;
pub mod stream_hub;
pub mod traits;

pub use deps::{EnvProviderFactory, SearchDeps};
pub use email::ResendMailer;
pub use pricing::RegistrarPricing;
pub use scheduler::SearchScheduler;
pub use store::{IndexStore, JobIndexRow, StoreManager};
pub use stream_hub::{SearchEvent, StreamHub};
pub use traits::{
    AvailabilityChecker, DomainPrice, Mailer, NoopMailer, NoopPricing, PricingService,
    ProviderFactory, RdapChecker,
};
