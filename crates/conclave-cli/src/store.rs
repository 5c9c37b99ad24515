//! Thin, mesh-free access to the persisted document store for commands
//! that only read or patch already-persisted state (`status`, `events`,
//! `retry`, `escalate`) without spinning up the in-process actor mesh
//! [`crate::engine::Engine`] does for `submit`.

use anyhow::Result;
use conclave_core::config::RuntimeOptions;
use conclave_store::client::DocumentStoreClient;
use conclave_store::schema::ensure_schema;

pub async fn connect_client(opts: &RuntimeOptions) -> Result<DocumentStoreClient> {
    let client = DocumentStoreClient::new(
        opts.arcade_db.url.clone(),
        opts.arcade_db.database.clone(),
        opts.arcade_db.user.clone(),
        opts.arcade_db.password.clone(),
    );
    if opts.arcade_db.auto_create_schema {
        ensure_schema(&client).await;
    }
    Ok(client)
}
