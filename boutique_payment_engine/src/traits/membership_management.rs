use crate::{db_types::User, traits::PaymentGatewayError};

/// Premium-membership state on user accounts. This trait owns `is_premium` and `membership_expiry` and nothing
/// else on the user record.
#[allow(async_fn_in_trait)]
pub trait MembershipManagement: Clone {
    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, PaymentGatewayError>;

    /// Sets the premium flag and moves the expiry to `now + duration_months` calendar months.
    ///
    /// A repeat purchase resets the window from now rather than extending the old expiry — the storefront's
    /// historical behaviour. Callers must have already deduplicated the triggering payment; this method itself
    /// applies unconditionally.
    async fn grant_premium(&self, user_id: i64, duration_months: u32) -> Result<User, PaymentGatewayError>;

    /// The derived membership check: `true` iff the flag is set and the expiry lies in the future.
    async fn is_premium_member(&self, user_id: i64) -> Result<bool, PaymentGatewayError>;

    /// All users whose membership is currently active.
    async fn fetch_premium_users(&self) -> Result<Vec<User>, PaymentGatewayError>;
}
