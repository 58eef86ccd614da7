use bson::{doc, Document};
use mongodb::options::ReplaceOptions;
use mongodb::sync::{Client, Collection};
use tracing::info;

use super::store::{is_diff_update, Store};
use crate::error::Result;
use crate::operation::{DocId, Namespace};
use crate::{ADMIN_DB_NAME, ID_KEY};

#[derive(Clone, Debug)]
/// A mongodb replay target.
///
/// Every call is one single document command: `replace_one` with upsert for inserts,
/// `update_one`/`replace_one` for updates and `delete_one` for removes.
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// connect to mongodb at `uri`.
    pub fn new(uri: &str) -> Result<MongoStore> {
        let client = Client::with_uri_str(uri)?;
        Ok(MongoStore { client })
    }

    /// wrap an existing `client`.
    pub fn from_client(client: Client) -> MongoStore {
        MongoStore { client }
    }

    /// Make sure the server is reachable before replay begins.
    pub fn check_connection(&self) -> Result<()> {
        self.client
            .database(ADMIN_DB_NAME)
            .run_command(doc! {"ping": 1}, None)?;
        info!("Target mongodb is reachable.");
        Ok(())
    }

    /// get target mongodb client.
    pub fn get_client(&self) -> &Client {
        &self.client
    }

    fn coll(&self, ns: &Namespace) -> Collection<Document> {
        self.client
            .database(ns.db_name())
            .collection::<Document>(ns.coll_name())
    }
}

fn id_filter(id: &DocId) -> Document {
    doc! { ID_KEY: id.to_bson() }
}

impl Store for MongoStore {
    fn upsert_by_id(&mut self, ns: &Namespace, id: &DocId, doc: &Document) -> Result<()> {
        self.coll(ns).replace_one(
            id_filter(id),
            doc.clone(),
            ReplaceOptions::builder().upsert(true).build(),
        )?;
        Ok(())
    }

    fn update_by_id(&mut self, ns: &Namespace, id: &DocId, update: &Document) -> Result<bool> {
        let coll = self.coll(ns);
        let result = if is_diff_update(update) {
            coll.update_one(id_filter(id), update.clone(), None)?
        } else {
            coll.replace_one(id_filter(id), update.clone(), None)?
        };
        Ok(result.matched_count > 0)
    }

    fn delete_by_id(&mut self, ns: &Namespace, id: &DocId) -> Result<bool> {
        let result = self.coll(ns).delete_one(id_filter(id), None)?;
        Ok(result.deleted_count > 0)
    }
}
