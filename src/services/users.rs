use std::collections::HashMap;

use common::{AddUserRequest, UserView};
use model::entities::{password_reset_token, role, session, user, user_detail};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use super::sessions::{SessionManager, now};
use super::templates;
use crate::errors::{AppError, AppResult};
use crate::schemas::AppState;

fn view_of(user: user::Model, detail: user_detail::Model, role_name: String) -> UserView {
    UserView {
        id: user.id,
        full_name: detail.full_name,
        email: detail.email,
        role: role_name,
        status: user.status,
        is_temp_password: user.is_temp_password,
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loads the joined user view, `None` when the user or its profile is missing.
pub async fn find_view<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<Option<UserView>> {
    let Some((user, Some(detail))) = user::Entity::find_by_id(user_id)
        .find_also_related(user_detail::Entity)
        .one(conn)
        .await?
    else {
        return Ok(None);
    };

    let role_name = role::Entity::find_by_id(user.role_id)
        .one(conn)
        .await?
        .map(|r| r.name)
        .unwrap_or_default();
    Ok(Some(view_of(user, detail, role_name)))
}

#[instrument(skip(db))]
pub async fn list_views(db: &DatabaseConnection) -> AppResult<Vec<UserView>> {
    let roles: HashMap<i32, String> = role::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r.name))
        .collect();

    let rows = user::Entity::find()
        .find_also_related(user_detail::Entity)
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?;
    debug!("Retrieved {} users from database", rows.len());

    Ok(rows
        .into_iter()
        .filter_map(|(user, detail)| {
            let detail = detail?;
            let role_name = roles.get(&user.role_id).cloned().unwrap_or_default();
            Some(view_of(user, detail, role_name))
        })
        .collect())
}

/// Role names are matched case-insensitively; stored names are lowercase.
pub async fn role_by_name<C: ConnectionTrait>(conn: &C, name: &str) -> AppResult<role::Model> {
    role::Entity::find()
        .filter(role::Column::Name.eq(name.trim().to_lowercase()))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::RoleNotFound(name.to_string()))
}

/// Inserts any missing default role.
#[instrument(skip(db))]
pub async fn ensure_roles(db: &DatabaseConnection) -> AppResult<()> {
    for name in role::DEFAULT_ROLES {
        let exists = role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .one(db)
            .await?
            .is_some();
        if !exists {
            role::ActiveModel {
                name: Set(name.to_string()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            info!("Created missing role '{}'", name);
        }
    }
    Ok(())
}

/// Inserts user and profile with a fresh temporary password in one
/// transaction. Returns the view and the plaintext temporary password.
async fn insert_with_temp_password(
    state: &AppState,
    request: &AddUserRequest,
    created_by: Option<i32>,
) -> AppResult<(UserView, String)> {
    let email = normalize_email(&request.email);
    let temp_password = state.passwords.generate_temp_password();
    let password_hash = state.passwords.hash_blocking(&temp_password).await?;
    let duplicate = || AppError::DuplicateEmail(email.clone());

    let txn = state.db.begin().await?;
    let role = role_by_name(&txn, &request.role).await?;

    let user = user::ActiveModel {
        username: Set(email.clone()),
        password_hash: Set(password_hash),
        role_id: Set(role.id),
        status: Set(request.status),
        is_temp_password: Set(true),
        created_by: Set(created_by),
        created_date: Set(now()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| AppError::on_unique_violation(e, duplicate))?;

    let detail = user_detail::ActiveModel {
        user_id: Set(user.id),
        email: Set(email.clone()),
        full_name: Set(request.full_name.trim().to_string()),
        status: Set(request.status),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| AppError::on_unique_violation(e, duplicate))?;

    txn.commit()
        .await
        .map_err(|e| AppError::on_unique_violation(e, duplicate))?;

    info!("User created successfully with ID: {}, email: {}", user.id, email);
    Ok((view_of(user, detail, role.name), temp_password))
}

/// Creates a user holding a temporary password and mails the credentials.
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn create_user(
    state: &AppState,
    request: &AddUserRequest,
    created_by: Option<i32>,
) -> AppResult<UserView> {
    let (view, temp_password) = insert_with_temp_password(state, request, created_by).await?;
    state
        .notifications
        .dispatch(templates::welcome(&view.full_name, &view.email, &temp_password));
    Ok(view)
}

/// Replaces the editable fields of a user.
///
/// An email change issues a new temporary password and ends the user's
/// sessions; so does deactivation. Emails go out after commit.
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn update_user(
    state: &AppState,
    user_id: i32,
    request: &AddUserRequest,
    modified_by: i32,
) -> AppResult<UserView> {
    let new_email = normalize_email(&request.email);
    let taken = || AppError::Conflict(format!("Email '{}' is already used by another user", new_email));

    let txn = state.db.begin().await?;
    let (user, detail) = match user::Entity::find_by_id(user_id)
        .find_also_related(user_detail::Entity)
        .one(&txn)
        .await?
    {
        Some((user, Some(detail))) => (user, detail),
        Some((_, None)) => {
            return Err(AppError::Internal(format!("User {user_id} has no profile")));
        }
        None => return Err(AppError::NotFound(format!("User with ID {user_id} not found"))),
    };

    let old_email = detail.email.clone();
    let email_changed = new_email != old_email;
    if email_changed {
        let used_elsewhere = user_detail::Entity::find()
            .filter(user_detail::Column::Email.eq(&new_email))
            .filter(user_detail::Column::UserId.ne(user_id))
            .count(&txn)
            .await?
            > 0;
        if used_elsewhere {
            return Err(taken());
        }
    }

    // Only an email change rotates the password.
    let temp_credentials = if email_changed {
        let temp_password = state.passwords.generate_temp_password();
        let temp_hash = state.passwords.hash_blocking(&temp_password).await?;
        Some((temp_password, temp_hash))
    } else {
        None
    };

    let role = role_by_name(&txn, &request.role).await?;
    let deactivated = user.status && !request.status;
    let modified_at = now();

    let mut active_user = user.into_active_model();
    active_user.role_id = Set(role.id);
    active_user.status = Set(request.status);
    active_user.modified_by = Set(Some(modified_by));
    active_user.modified_date = Set(Some(modified_at));
    if let Some((_, temp_hash)) = &temp_credentials {
        active_user.username = Set(new_email.clone());
        active_user.password_hash = Set(temp_hash.clone());
        active_user.is_temp_password = Set(true);
    }
    let user = active_user
        .update(&txn)
        .await
        .map_err(|e| AppError::on_unique_violation(e, taken))?;

    let mut active_detail = detail.into_active_model();
    active_detail.email = Set(new_email.clone());
    active_detail.full_name = Set(request.full_name.trim().to_string());
    active_detail.status = Set(request.status);
    let detail = active_detail
        .update(&txn)
        .await
        .map_err(|e| AppError::on_unique_violation(e, taken))?;

    if email_changed || deactivated {
        SessionManager::end_all_for_user_in(&txn, user_id, modified_at).await?;
    }

    txn.commit()
        .await
        .map_err(|e| AppError::on_unique_violation(e, taken))?;
    info!(
        "User {} updated (email_changed: {}, deactivated: {})",
        user_id, email_changed, deactivated
    );

    if let Some((temp_password, _)) = &temp_credentials {
        state.notifications.dispatch(templates::email_updated(
            &detail.full_name,
            &old_email,
            &new_email,
        ));
        state.notifications.dispatch(templates::temp_password(
            &detail.full_name,
            &new_email,
            temp_password,
        ));
    }
    if deactivated {
        state
            .notifications
            .dispatch(templates::account_deactivated(&detail.full_name, &new_email));
    }

    Ok(view_of(user, detail, role.name))
}

/// Issues a new temporary password, ends the user's sessions and mails the
/// credentials.
#[instrument(skip(state))]
pub async fn reset_temp_password(state: &AppState, user_id: i32, modified_by: i32) -> AppResult<()> {
    let temp_password = state.passwords.generate_temp_password();
    let temp_hash = state.passwords.hash_blocking(&temp_password).await?;

    let txn = state.db.begin().await?;
    let Some((user, Some(detail))) = user::Entity::find_by_id(user_id)
        .find_also_related(user_detail::Entity)
        .one(&txn)
        .await?
    else {
        return Err(AppError::NotFound(format!("User with ID {user_id} not found")));
    };

    let modified_at = now();
    let mut active_user = user.into_active_model();
    active_user.password_hash = Set(temp_hash);
    active_user.is_temp_password = Set(true);
    active_user.modified_by = Set(Some(modified_by));
    active_user.modified_date = Set(Some(modified_at));
    active_user.update(&txn).await?;

    SessionManager::end_all_for_user_in(&txn, user_id, modified_at).await?;
    txn.commit().await?;

    info!("Temporary password reset for user {}", user_id);
    state.notifications.dispatch(templates::temp_password(
        &detail.full_name,
        &detail.email,
        &temp_password,
    ));
    Ok(())
}

/// Removes reset tokens, sessions, profile and account in one transaction.
#[instrument(skip(db))]
pub async fn delete_user(db: &DatabaseConnection, user_id: i32) -> AppResult<()> {
    let txn = db.begin().await?;

    if user::Entity::find_by_id(user_id).one(&txn).await?.is_none() {
        return Err(AppError::NotFound(format!("User with ID {user_id} not found")));
    }

    password_reset_token::Entity::delete_many()
        .filter(password_reset_token::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    let sessions = session::Entity::delete_many()
        .filter(session::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    user_detail::Entity::delete_many()
        .filter(user_detail::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    user::Entity::delete_by_id(user_id).exec(&txn).await?;

    txn.commit().await?;
    info!(
        "User {} deleted along with {} session(s)",
        user_id, sessions.rows_affected
    );
    Ok(())
}

/// Creates the initial admin when no user holds the admin role yet.
/// Returns the new admin's ID.
#[instrument(skip(state))]
pub async fn bootstrap_admin(state: &AppState) -> AppResult<Option<i32>> {
    let admin_role = role_by_name(&state.db, role::ADMIN).await?;
    let admins = user::Entity::find()
        .filter(user::Column::RoleId.eq(admin_role.id))
        .count(&state.db)
        .await?;
    if admins > 0 {
        debug!("{} admin(s) present, no bootstrap needed", admins);
        return Ok(None);
    }

    let admin = &state.settings.admin;
    let (Some(email), Some(full_name)) = (&admin.email, &admin.full_name) else {
        warn!("No admin user exists and admin.email / admin.full_name are not configured");
        return Ok(None);
    };

    let request = AddUserRequest {
        full_name: full_name.clone(),
        email: email.clone(),
        role: role::ADMIN.to_string(),
        status: true,
    };
    let (view, temp_password) = insert_with_temp_password(state, &request, None).await?;
    state.notifications.dispatch(templates::initial_admin(
        &view.full_name,
        &view.email,
        &temp_password,
    ));

    info!("Initial admin {} created", view.email);
    Ok(Some(view.id))
}
