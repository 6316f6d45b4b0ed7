use log::info;
use mongodb::{options::ClientOptions, Client, Database};

use crate::store::{MongoTaskStore, MongoUserStore, StoreError};

pub struct MongoDB {
    pub client: Client,
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        info!("Using MongoDB database {}", db_name);
        Ok(MongoDB { client, db })
    }

    /// Builds both stores and makes sure their indexes exist.
    pub async fn stores(&self) -> Result<(MongoTaskStore, MongoUserStore), StoreError> {
        let tasks = MongoTaskStore::new(&self.db);
        tasks.ensure_indexes().await?;
        let users = MongoUserStore::new(&self.db);
        users.ensure_indexes().await?;
        Ok((tasks, users))
    }
}
