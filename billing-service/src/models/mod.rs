pub mod account;
pub mod client;
pub mod document;
pub mod event;
pub mod invitation;
pub mod membership;
pub mod organization;
pub mod plan;
pub mod subscription;
pub mod tax;

pub use account::Account;
pub use client::{ClientProfile, ClientTaxProfile};
pub use document::{Document, DocumentSnapshot, PartySnapshot};
pub use event::{ProviderEvent, ReconcileOutcome};
pub use invitation::{Invitation, InvitationStatus};
pub use membership::{Membership, Role};
pub use organization::{Organization, OrganizationType};
pub use plan::{Plan, PlanCatalog};
pub use subscription::{Subscription, SubscriptionStatus};
pub use tax::TaxProfile;
