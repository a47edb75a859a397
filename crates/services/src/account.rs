//! # Account Lifecycle
//!
//! Registration, e-mail verification, login and the read-side user queries.

use std::sync::Arc;

use domains::{
    normalize_email, ConfirmHashGenerator, DomainError, Email, IssuedToken, Outbox, OutboundEvent,
    PasswordHasher, Result, TokenService, User, UserRepository,
};
use uuid::Uuid;

use crate::validation::{self, LoginInput, RegisterInput};

#[derive(Debug, Clone)]
pub struct AccountSettings {
    /// Public origin used to build verification links, without trailing slash.
    pub verify_base_url: String,
    /// When set, unconfirmed accounts cannot log in.
    pub require_confirmed_login: bool,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            verify_base_url: "http://localhost:3000".to_string(),
            require_confirmed_login: false,
        }
    }
}

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    confirm: Arc<dyn ConfirmHashGenerator>,
    tokens: Arc<dyn TokenService>,
    outbox: Arc<dyn Outbox>,
    settings: AccountSettings,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        confirm: Arc<dyn ConfirmHashGenerator>,
        tokens: Arc<dyn TokenService>,
        outbox: Arc<dyn Outbox>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            users,
            hasher,
            confirm,
            tokens,
            outbox,
            settings,
        }
    }

    /// Creates an unconfirmed account and queues the verification e-mail.
    ///
    /// The e-mail is best effort: a closed outbox is logged and the
    /// registration still succeeds.
    pub async fn register(&self, input: RegisterInput) -> Result<User> {
        validation::validate_registration(&input)?;

        let password_hash = self.hash_password(input.password).await?;
        let user = User::new(
            &input.email,
            &input.fullname,
            password_hash,
            self.confirm.generate(),
        );
        let user = self.users.insert(user).await?;
        tracing::info!(user_id = %user.id, "account registered");

        let email = self.verification_email(&user);
        if let Err(e) = self.outbox.enqueue(OutboundEvent::Email(email)) {
            tracing::warn!(user_id = %user.id, error = %e, "verification email not queued");
        }
        Ok(user)
    }

    /// Activates the account owning `hash`. Calling it again is harmless.
    pub async fn verify(&self, hash: &str) -> Result<User> {
        let hash = hash.trim();
        if hash.is_empty() {
            return Err(DomainError::invalid("hash", "Hash not found"));
        }

        let mut user = self
            .users
            .find_by_confirm_hash(hash)
            .await?
            .ok_or_else(|| DomainError::NotFound("Invalid Token Provided".into()))?;

        user.confirmed = true;
        user.updated_at = chrono::Utc::now();
        self.users.save(&user).await?;
        tracing::info!(user_id = %user.id, "account confirmed");
        Ok(user)
    }

    /// Checks credentials and issues a claim.
    pub async fn login(&self, input: LoginInput) -> Result<IssuedToken> {
        validation::validate_login(&input)?;

        let user = self
            .users
            .find_by_email(&normalize_email(&input.email))
            .await?
            .ok_or_else(|| DomainError::NotFound("User not found".into()))?;

        if !self.check_password(input.password, user.password_hash.clone()).await? {
            tracing::debug!(user_id = %user.id, "login rejected: password mismatch");
            return Err(DomainError::Forbidden("Incorrect password or email".into()));
        }
        if self.settings.require_confirmed_login && !user.confirmed {
            return Err(DomainError::Forbidden("Account is not confirmed".into()));
        }

        let token = self.tokens.issue(user.id)?;
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(token)
    }

    pub async fn get(&self, id: Uuid) -> Result<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Not Found".into()))
    }

    /// The account behind an authenticated claim.
    pub async fn me(&self, user_id: Uuid) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Not found".into()))
    }

    pub async fn search(&self, query: &str) -> Result<Vec<User>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.users.search(query).await
    }

    /// Deletes an account. Only the owner of the account may do so; an
    /// unknown id is `NotFound` whoever asks.
    pub async fn delete(&self, actor: Uuid, id: Uuid) -> Result<User> {
        let not_found = || DomainError::NotFound("Not Found".into());
        let existing = self.users.find_by_id(id).await?.ok_or_else(not_found)?;
        if existing.id != actor {
            return Err(DomainError::Forbidden(
                "You can only delete your own account".into(),
            ));
        }
        let user = self.users.delete(id).await?.ok_or_else(not_found)?;
        tracing::info!(user_id = %user.id, "account deleted");
        Ok(user)
    }

    fn verification_email(&self, user: &User) -> Email {
        let link = format!(
            "{}/user/verify?hash={}",
            self.settings.verify_base_url.trim_end_matches('/'),
            user.confirm_hash
        );
        Email {
            to: user.email.clone(),
            subject: "Slim Chat account verification".to_string(),
            body: format!(
                "Hello {name}, and thank you for registering on Slim Chat.\n\n\
                 email: {email}\n\n\
                 Please follow this link to verify your account:\n\n\
                 {link}\n",
                name = user.fullname,
                email = user.email,
            ),
        }
    }

    async fn hash_password(&self, plaintext: String) -> Result<String> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(DomainError::internal)?
    }

    async fn check_password(&self, plaintext: String, hash: String) -> Result<bool> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &hash))
            .await
            .map_err(DomainError::internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{
        MockConfirmHashGenerator, MockOutbox, MockPasswordHasher, MockTokenService,
        MockUserRepository,
    };
    use mockall::predicate::eq;

    struct Mocks {
        users: MockUserRepository,
        hasher: MockPasswordHasher,
        confirm: MockConfirmHashGenerator,
        tokens: MockTokenService,
        outbox: MockOutbox,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                users: MockUserRepository::new(),
                hasher: MockPasswordHasher::new(),
                confirm: MockConfirmHashGenerator::new(),
                tokens: MockTokenService::new(),
                outbox: MockOutbox::new(),
            }
        }

        fn service(self, settings: AccountSettings) -> AccountService {
            AccountService::new(
                Arc::new(self.users),
                Arc::new(self.hasher),
                Arc::new(self.confirm),
                Arc::new(self.tokens),
                Arc::new(self.outbox),
                settings,
            )
        }
    }

    fn stored_user(confirmed: bool) -> User {
        let mut user = User::new("a@b.com", "A B", "hashed:pw1".into(), "abc123".into());
        user.confirmed = confirmed;
        user
    }

    fn register_input() -> RegisterInput {
        RegisterInput {
            email: "A@B.com".into(),
            fullname: "A B".into(),
            password: "pw1".into(),
        }
    }

    fn login_input(password: &str) -> LoginInput {
        LoginInput {
            email: "a@b.com".into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_persists_unconfirmed_user_and_queues_link() {
        let mut m = Mocks::new();
        m.hasher
            .expect_hash()
            .with(eq("pw1"))
            .returning(|p| Ok(format!("hashed:{p}")));
        m.confirm.expect_generate().return_const("abc123".to_string());
        m.users.expect_insert().returning(Ok);
        m.outbox
            .expect_enqueue()
            .withf(|event| match event {
                OutboundEvent::Email(email) => {
                    email.to == "a@b.com"
                        && email.body.contains("https://chat.test/user/verify?hash=abc123")
                }
                _ => false,
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = m.service(AccountSettings {
            verify_base_url: "https://chat.test/".into(),
            ..AccountSettings::default()
        });
        let user = service.register(register_input()).await.unwrap();

        assert_eq!(user.email, "a@b.com");
        assert!(!user.confirmed);
        assert_eq!(user.confirm_hash, "abc123");
        assert_eq!(user.password_hash, "hashed:pw1");
    }

    #[tokio::test]
    async fn register_survives_closed_outbox() {
        let mut m = Mocks::new();
        m.hasher.expect_hash().returning(|p| Ok(format!("hashed:{p}")));
        m.confirm.expect_generate().return_const("abc123".to_string());
        m.users.expect_insert().returning(Ok);
        m.outbox
            .expect_enqueue()
            .returning(|_| Err(DomainError::Internal("outbox closed".into())));

        let user = m
            .service(AccountSettings::default())
            .register(register_input())
            .await
            .unwrap();
        assert_eq!(user.fullname, "A B");
    }

    #[tokio::test]
    async fn register_rejects_invalid_input_before_touching_store() {
        let m = Mocks::new();
        let err = m
            .service(AccountSettings::default())
            .register(RegisterInput {
                email: "bad".into(),
                fullname: "A".into(),
                password: "pw1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref f) if f[0].field == "email"));
    }

    #[tokio::test]
    async fn register_propagates_duplicate_email() {
        let mut m = Mocks::new();
        m.hasher.expect_hash().returning(|p| Ok(format!("hashed:{p}")));
        m.confirm.expect_generate().return_const("abc123".to_string());
        m.users
            .expect_insert()
            .returning(|_| Err(DomainError::Conflict("Email already registered".into())));

        let err = m
            .service(AccountSettings::default())
            .register(register_input())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn verify_confirms_and_is_repeatable() {
        let mut m = Mocks::new();
        let user = stored_user(false);
        let confirmed = {
            let mut u = user.clone();
            u.confirmed = true;
            u
        };
        let mut seq = mockall::Sequence::new();
        m.users
            .expect_find_by_confirm_hash()
            .with(eq("abc123"))
            .times(1)
            .in_sequence(&mut seq)
            .return_once(move |_| Ok(Some(user)));
        m.users
            .expect_find_by_confirm_hash()
            .with(eq("abc123"))
            .times(1)
            .in_sequence(&mut seq)
            .return_once(move |_| Ok(Some(confirmed)));
        m.users
            .expect_save()
            .withf(|u| u.confirmed)
            .times(2)
            .returning(|_| Ok(()));

        let service = m.service(AccountSettings::default());
        assert!(service.verify("abc123").await.unwrap().confirmed);
        assert!(service.verify("abc123").await.unwrap().confirmed);
    }

    #[tokio::test]
    async fn verify_without_hash_is_a_validation_error() {
        let service = Mocks::new().service(AccountSettings::default());
        let err = service.verify("  ").await.unwrap_err();
        assert_eq!(err, DomainError::invalid("hash", "Hash not found"));
    }

    #[tokio::test]
    async fn verify_unknown_hash_is_not_found() {
        let mut m = Mocks::new();
        m.users.expect_find_by_confirm_hash().returning(|_| Ok(None));
        let err = m
            .service(AccountSettings::default())
            .verify("nope")
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("Invalid Token Provided".into()));
    }

    #[tokio::test]
    async fn login_issues_token_for_unconfirmed_account_by_default() {
        let mut m = Mocks::new();
        let user = stored_user(false);
        let user_id = user.id;
        m.users
            .expect_find_by_email()
            .with(eq("a@b.com"))
            .return_once(move |_| Ok(Some(user)));
        m.hasher
            .expect_verify()
            .returning(|plain, hash| hash == format!("hashed:{plain}"));
        m.tokens
            .expect_issue()
            .with(eq(user_id))
            .returning(|_| {
                Ok(IssuedToken {
                    token: "signed".into(),
                    expires_at: chrono::Utc::now(),
                })
            });

        let token = m
            .service(AccountSettings::default())
            .login(login_input("pw1"))
            .await
            .unwrap();
        assert_eq!(token.token, "signed");
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_forbidden() {
        let mut m = Mocks::new();
        m.users
            .expect_find_by_email()
            .return_once(|_| Ok(Some(stored_user(true))));
        m.hasher.expect_verify().return_const(false);

        let err = m
            .service(AccountSettings::default())
            .login(login_input("wrong"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::Forbidden("Incorrect password or email".into())
        );
    }

    #[tokio::test]
    async fn login_unknown_email_is_not_found() {
        let mut m = Mocks::new();
        m.users.expect_find_by_email().returning(|_| Ok(None));
        let err = m
            .service(AccountSettings::default())
            .login(login_input("pw1"))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("User not found".into()));
    }

    #[tokio::test]
    async fn login_can_require_confirmation() {
        let mut m = Mocks::new();
        m.users
            .expect_find_by_email()
            .return_once(|_| Ok(Some(stored_user(false))));
        m.hasher.expect_verify().return_const(true);

        let err = m
            .service(AccountSettings {
                require_confirmed_login: true,
                ..AccountSettings::default()
            })
            .login(login_input("pw1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn search_with_blank_query_skips_store() {
        let service = Mocks::new().service(AccountSettings::default());
        assert!(service.search("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_account_is_not_found() {
        let mut m = Mocks::new();
        m.users.expect_find_by_id().returning(|_| Ok(None));
        m.users.expect_delete().never();
        let err = m
            .service(AccountSettings::default())
            .delete(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("Not Found".into()));
    }

    #[tokio::test]
    async fn delete_someone_else_is_forbidden() {
        let mut m = Mocks::new();
        let victim = stored_user(true);
        m.users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(victim.clone())));
        m.users.expect_delete().never();
        let err = m
            .service(AccountSettings::default())
            .delete(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn owner_deletes_own_account() {
        let mut m = Mocks::new();
        let user = stored_user(true);
        let id = user.id;
        let found = user.clone();
        m.users
            .expect_find_by_id()
            .with(eq(id))
            .returning(move |_| Ok(Some(found.clone())));
        m.users
            .expect_delete()
            .with(eq(id))
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        let deleted = m
            .service(AccountSettings::default())
            .delete(id, id)
            .await
            .unwrap();
        assert_eq!(deleted.id, id);
    }
}
