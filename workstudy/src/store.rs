use crate::{
    broadcast::{Change, ChangeHub},
    model::{Application, Job, Record, TableName, Tables, Timesheet, User},
    persistence::PersistenceAdapter,
};
use std::{
    convert::Infallible,
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, warn};

/// In-memory tables of one view context.
///
/// Every mutation replaces a whole table, writes it to the durable backing and
/// then publishes a [`Change`] on the hub, in that order. Two stores over the
/// same backing do not coordinate: a store that replaces a table from a stale
/// snapshot overwrites whatever the other one wrote after that snapshot was
/// taken (last writer wins).
pub struct Store {
    tables: Mutex<Tables>,
    adapter: PersistenceAdapter,
    hub: ChangeHub,
}

impl Store {
    /// Creates a store with empty tables. Nothing is read until [`Store::load`].
    pub fn new(adapter: PersistenceAdapter, hub: ChangeHub) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            adapter,
            hub,
        }
    }

    /// Creates a store and loads every table from the durable backing.
    pub fn open(adapter: PersistenceAdapter, hub: ChangeHub) -> Self {
        let store = Self::new(adapter, hub);
        store.load_all();
        store
    }

    pub fn hub(&self) -> &ChangeHub {
        &self.hub
    }

    pub fn adapter(&self) -> &PersistenceAdapter {
        &self.adapter
    }

    pub fn get<T: Record>(&self) -> Vec<T> {
        T::table(&self.lock()).clone()
    }

    pub fn snapshot(&self) -> Tables {
        self.lock().clone()
    }

    /// Re-reads one table from the durable backing (seed on absent or
    /// malformed state) and installs it in memory. No change is published.
    pub fn load<T: Record>(&self) -> Vec<T> {
        let records = self.adapter.load(T::TABLE, T::seed());
        debug!(table = %T::TABLE, count = records.len(), "Loaded table");
        *T::table_mut(&mut self.lock()) = records.clone();
        records
    }

    pub fn load_all(&self) {
        for table in TableName::ALL {
            self.load_table(table);
        }
    }

    /// Reloads whatever `change` names.
    pub fn reload(&self, change: Change) {
        match change {
            Change::Table(table) => self.load_table(table),
            Change::All => self.load_all(),
        }
    }

    /// Reads every table from the durable backing without touching memory.
    pub fn durable_snapshot(&self) -> Tables {
        Tables {
            jobs: self.adapter.load(TableName::Jobs, Job::seed()),
            applications: self.adapter.load(TableName::Applications, Application::seed()),
            timesheets: self.adapter.load(TableName::Timesheets, Timesheet::seed()),
            users: self.adapter.load(TableName::Users, User::seed()),
        }
    }

    fn load_table(&self, table: TableName) {
        match table {
            TableName::Jobs => {
                self.load::<Job>();
            }
            TableName::Applications => {
                self.load::<Application>();
            }
            TableName::Timesheets => {
                self.load::<Timesheet>();
            }
            TableName::Users => {
                self.load::<User>();
            }
        }
    }

    /// Swaps the whole table for `records`.
    pub fn replace<T: Record>(&self, records: Vec<T>) {
        self.update(move |table: &mut Vec<T>| *table = records);
    }

    /// Applies `f` to a copy of the current table and replaces the table with
    /// the result.
    pub fn update<T: Record, R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        let res: Result<R, Infallible> = self.try_update(|table| Ok(f(table)));
        match res {
            Ok(out) => out,
            Err(never) => match never {},
        }
    }

    /// Like [`Store::update`], but an `Err` from `f` leaves the store, the
    /// backing and the subscribers untouched.
    pub fn try_update<T: Record, R, E>(
        &self,
        f: impl FnOnce(&mut Vec<T>) -> Result<R, E>,
    ) -> Result<R, E> {
        let out = {
            let mut tables = self.lock();
            let mut next = T::table(&tables).clone();
            let out = f(&mut next)?;
            *T::table_mut(&mut tables) = next;
            // memory keeps the new table even if the write fails
            if let Err(e) = self.adapter.save(T::TABLE, T::table(&tables)) {
                warn!(table = %T::TABLE, error = %e, "Durable write failed");
            }
            out
        };
        self.hub.publish(Change::Table(T::TABLE));
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}
