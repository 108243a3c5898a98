#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;
use rocket::{Build, Rocket};

/// Assemble the server: routes, catchers, config, database, and logging.
/// The heavy lifting (connecting, index/counter/admin setup) happens in the
/// fairings at ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(LoggerFairing)
}

/// Connect to the database configured via `db_uri` (tests only; the real
/// server connects through `DatabaseFairing`).
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri: String = rocket::Config::figment()
        .extract_inner("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .expect("Could not connect to database")
}

/// A fresh random database name, so concurrent tests never collide.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// Build a rocket instance against an existing client and database name,
/// running the same setup the database fairing would. Used by the
/// `#[backend_test]` harness.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    use crate::model::mongodb::{ensure_counters_exist, ensure_indexes_exist, Coll};

    let db = client.database(db_name);
    let config: Config = rocket::Config::figment()
        .extract()
        .expect("invalid application config");

    ensure_indexes_exist(&db).await.expect("index setup failed");
    ensure_counters_exist(&Coll::from_db(&db))
        .await
        .expect("counter setup failed");
    model::db::ensure_admin_exists(&Coll::from_db(&db), &Coll::from_db(&db), &config)
        .await
        .expect("admin setup failed");

    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(ConfigFairing)
        .manage(client)
        .manage(db)
}
