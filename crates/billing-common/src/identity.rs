//! Identity types for tenants, environments, customers, and billing entities.
//!
//! Every persisted row in the billing core is keyed by `(tenant_id, environment_id, id)`
//! (see spec §6). Each concept gets its own newtype over `Uuid` so that a `CouponId`
//! can never be passed where an `InvoiceId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid_str = s.strip_prefix(concat!($prefix, ":")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }
    };
}

uuid_id!(TenantId, "tenant");
uuid_id!(EnvironmentId, "env");
uuid_id!(UserId, "user");
uuid_id!(CustomerId, "cust");
uuid_id!(SubscriptionId, "sub");
uuid_id!(SubscriptionLineItemId, "subli");
uuid_id!(PriceId, "price");
uuid_id!(InvoiceId, "inv");
uuid_id!(InvoiceLineItemId, "invli");
uuid_id!(CouponId, "coupon");
uuid_id!(CouponApplicationId, "couponapp");
uuid_id!(CreditNoteId, "cn");
uuid_id!(ScheduledTaskId, "sched");
uuid_id!(WalletId, "wallet");
uuid_id!(MeterId, "meter");

/// Request-scoped identity and cancellation, threaded explicitly through every port call.
///
/// This replaces the teacher's ambient context-threaded tenant/environment/user pattern
/// (flagged for re-architecture in spec §9): no task-local or thread-local state, just a
/// value every service method takes as its first argument.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_id: TenantId,
    pub environment_id: EnvironmentId,
    pub user_id: Option<UserId>,
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl RequestContext {
    pub fn new(tenant_id: TenantId, environment_id: EnvironmentId) -> Self {
        Self {
            tenant_id,
            environment_id,
            user_id: None,
            cancellation: tokio_util::sync::CancellationToken::new(),
        }
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// True once the caller has requested cancellation; ports should check this before
    /// issuing I/O (spec §5: "Every external call accepts and checks the cancellation
    /// context before issuing I/O").
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
