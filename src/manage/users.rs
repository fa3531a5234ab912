//! User accounts: registration, administrative updates, deletion and role
//! assignment.

use once_cell::sync::Lazy;
use postgres_types::ToSql;
use regex::Regex;

use crate::{
    Ctx,
    db::Transaction,
    error,
    model::{Key, User},
    password,
    prelude::*,
    version,
};


/// Handler for user accounts.
pub struct Users<'a> {
    pub(crate) ctx: &'a Ctx,
}

/// Data for registering a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Partial administrative update. Fields that are `None` are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub login: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap()
});

fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(Error::Validation("email must not be empty".into()));
    }
    if !EMAIL.is_match(email) {
        return Err(Error::Validation(format!("'{email}' is not a valid email address")));
    }
    Ok(())
}

fn validate_login(login: &str) -> Result<()> {
    if login.trim().is_empty() {
        return Err(Error::Validation("login must not be empty".into()));
    }
    Ok(())
}

impl Users<'_> {
    /// Registers a new user. The password is hashed before it goes anywhere
    /// near the store.
    pub async fn register(&self, new: NewUser) -> Result<User> {
        validate_login(&new.login)?;
        validate_email(&new.email)?;
        if new.password.is_empty() {
            return Err(Error::Validation("password must not be empty".into()));
        }
        let password_hash = password::hash(&new.password)?;

        let db = self.ctx.db().await?;
        let row = db.query_one(
            &format!(
                "insert into role_manager_users \
                    (login, email, password_hash, first_name, last_name) \
                    values ($1, $2, $3, $4, $5) \
                    returning {}",
                User::COLS,
            ),
            &[&new.login, &new.email, &password_hash, &new.first_name, &new.last_name],
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(constraint) if constraint.contains("email") => Error::Conflict(
                format!("a user with email '{}' already exists", new.email),
            ),
            Some(_) => Error::Conflict(
                format!("a user with login '{}' already exists", new.login),
            ),
            None => e.into(),
        })?;

        info!("Registered user '{}'", new.login);
        Ok(User::from_row(&row))
    }

    pub async fn by_id(&self, id: Key) -> Result<User> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_users where id = $1", User::COLS),
            &[&id],
        ).await?;
        row.map(|row| User::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no user with id {id}")))
    }

    pub async fn by_login(&self, login: &str) -> Result<User> {
        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!("select {} from role_manager_users where login = $1", User::COLS),
            &[&login],
        ).await?;
        row.map(|row| User::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no user with login '{login}'")))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let db = self.ctx.db().await?;
        let rows = db.query(
            &format!("select {} from role_manager_users order by login", User::COLS),
            &[],
        ).await?;
        Ok(rows.iter().map(User::from_row).collect())
    }

    /// Applies a partial update. Provided fields are validated like at
    /// registration.
    pub async fn update(&self, id: Key, update: UserUpdate) -> Result<User> {
        if let Some(login) = &update.login {
            validate_login(login)?;
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }
        let password_hash = match &update.password {
            Some(password) if password.is_empty() => {
                return Err(Error::Validation("password must not be empty".into()));
            }
            Some(password) => Some(password::hash(password)?),
            None => None,
        };

        // Build the dynamic `set` list; `$1` is the id.
        let mut assignments = Vec::new();
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&id];
        macro_rules! push_field {
            ($column:literal, $value:expr) => {
                if let Some(value) = $value {
                    params.push(value);
                    assignments.push(format!(concat!($column, " = ${}"), params.len()));
                }
            };
        }
        push_field!("login", &update.login);
        push_field!("email", &update.email);
        push_field!("password_hash", &password_hash);
        push_field!("first_name", &update.first_name);
        push_field!("last_name", &update.last_name);

        if assignments.is_empty() {
            return self.by_id(id).await;
        }

        let db = self.ctx.db().await?;
        let row = db.query_opt(
            &format!(
                "update role_manager_users set {} where id = $1 returning {}",
                assignments.join(", "),
                User::COLS,
            ),
            &params,
        ).await.map_err(|e| match error::unique_violation(&e) {
            Some(constraint) if constraint.contains("email") => Error::Conflict(
                "another user already uses this email".into(),
            ),
            Some(_) => Error::Conflict("another user already uses this login".into()),
            None => e.into(),
        })?;

        row.map(|row| User::from_row(&row))
            .ok_or_else(|| Error::NotFound(format!("no user with id {id}")))
    }

    /// Deletes a user. Refused while the user still has role assignments;
    /// group memberships are removed along with the user.
    pub async fn delete(&self, id: Key) -> Result<()> {
        let user = self.by_id(id).await?;

        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let assigned: bool = tx.query_one(
            "select exists(\
                select 1 from role_manager_user_context_roles where user_id = $1\
            )",
            &[&id],
        ).await?.get(0);
        if assigned {
            return Err(Error::Dependency(format!(
                "user '{}' still has role assignments and cannot be deleted",
                user.login,
            )));
        }

        tx.execute("delete from role_manager_users where id = $1", &[&id])
            .await
            .map_err(|e| match error::foreign_key_violation(&e) {
                Some(_) => Error::Dependency(format!(
                    "user '{}' still has role assignments and cannot be deleted",
                    user.login,
                )),
                None => e.into(),
            })?;
        tx.commit().await?;

        info!("Deleted user '{}'", user.login);
        Ok(())
    }

    /// Assigns a role to the user, in a specific context or globally
    /// (`context = None`).
    pub async fn assign_role(
        &self,
        user: Key,
        role: Key,
        context: Option<Key>,
    ) -> Result<()> {
        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        tx.execute(
            "insert into role_manager_user_context_roles (user_id, context_id, role_id) \
                values ($1, $2, $3)",
            &[&user, &context, &role],
        ).await.map_err(|e| {
            if error::unique_violation(&e).is_some() {
                Error::Conflict(format!(
                    "user {user} already has role {role} in this context",
                ))
            } else if error::foreign_key_violation(&e).is_some() {
                Error::NotFound("user, role or context does not exist".into())
            } else {
                e.into()
            }
        })?;

        version::bump(&tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Removes a role assignment. `context = None` targets the Global
    /// Context assignment.
    pub async fn unassign_role(
        &self,
        user: Key,
        role: Key,
        context: Option<Key>,
    ) -> Result<()> {
        let mut db = self.ctx.db().await?;
        let tx = Transaction::begin(&mut db).await?;

        let affected = tx.execute(
            "delete from role_manager_user_context_roles \
                where user_id = $1 and role_id = $2 and context_id is not distinct from $3",
            &[&user, &role, &context],
        ).await?;
        if affected == 0 {
            return Err(Error::NotFound(format!(
                "user {user} does not have role {role} in this context",
            )));
        }

        version::bump(&tx).await?;
        tx.commit().await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::validate_email;

    #[test]
    fn accepts_plausible_emails() {
        for email in ["alice@example.com", "a.b+c@sub.domain.org", "x@y.zz"] {
            assert!(validate_email(email).is_ok(), "{email} should be accepted");
        }
    }

    #[test]
    fn rejects_malformed_emails() {
        for email in ["", "alice", "alice@", "@example.com", "a b@example.com", "a@b"] {
            assert!(validate_email(email).is_err(), "{email} should be rejected");
        }
    }
}
