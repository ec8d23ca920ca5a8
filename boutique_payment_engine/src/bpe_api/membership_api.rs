use std::fmt::Debug;

use log::*;

use crate::{
    db_types::User,
    traits::{MembershipManagement, PaymentGatewayError},
};

/// Premium-membership operations. Grants happen as a side effect of a confirmed membership payment (either the
/// synchronous gateway path or a webhook); status checks are derived from the flag plus expiry.
pub struct MembershipApi<B> {
    db: B,
}

impl<B> Debug for MembershipApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MembershipApi")
    }
}

impl<B> MembershipApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> MembershipApi<B>
where B: MembershipManagement
{
    pub async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, PaymentGatewayError> {
        self.db.fetch_user(user_id).await
    }

    /// Sets the premium flag and resets the expiry window to `now + duration_months`.
    ///
    /// Callers are responsible for having deduplicated the triggering payment; repeated purchases deliberately
    /// reset (rather than extend) the window.
    pub async fn grant_premium(&self, user_id: i64, duration_months: u32) -> Result<User, PaymentGatewayError> {
        let user = self.db.grant_premium(user_id, duration_months).await?;
        info!("🎖️ User {user_id} granted premium for {duration_months} months");
        Ok(user)
    }

    /// `true` iff the user's premium flag is set and the expiry is still in the future.
    pub async fn is_premium_member(&self, user_id: i64) -> Result<bool, PaymentGatewayError> {
        self.db.is_premium_member(user_id).await
    }

    pub async fn fetch_premium_users(&self) -> Result<Vec<User>, PaymentGatewayError> {
        self.db.fetch_premium_users().await
    }
}
