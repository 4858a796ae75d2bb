//! Shared fixture for the engine integration tests
//!
//! Builds a catalog with four columns and 35 users whose ids sort in index
//! order (`Uuid::from_u128(i)`), so pages can be checked by user index.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Map, Value as Json};
use uuid::Uuid;

use userstore_engine::catalog::{InMemoryCatalog, Purpose};
use userstore_engine::clock::ManualClock;
use userstore_engine::config::EngineConfig;
use userstore_engine::model::{
    Accessor, Column, ColumnInputConfig, ColumnOutputConfig, DataLifeCycleState, DataType, Mutator,
    SelectorConfig, UserRecord, Value,
};
use userstore_engine::policy::ALLOW_ALL_POLICY_ID;
use userstore_engine::storage::InMemoryUserStore;
use userstore_engine::transform::PASSTHROUGH_TRANSFORMER_ID;
use userstore_engine::{AccessorResponse, Engine, EngineBuilder};

pub const USER_COUNT: u128 = 35;

pub const STRINGS: [&str; 5] = ["bar", "baz", "biz", "buz", "foo"];

pub fn user_id(index: u128) -> Uuid {
    Uuid::from_u128(index)
}

pub struct Fixture {
    pub config: EngineConfig,
    pub catalog: Arc<InMemoryCatalog>,
    pub users: Arc<InMemoryUserStore>,
    pub clock: Arc<ManualClock>,
    pub organization_id: Uuid,
    pub operational: Uuid,
    pub marketing: Uuid,
    pub name: Column,
    pub string: Column,
    pub boolean: Column,
    pub integer: Column,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Catalog and users for `config`.
    ///
    /// User `i` (1..=35) has `name = "user{i:02}"`, `string = STRINGS[i % 5]`,
    /// `boolean = i % 2 == 0` and `integer = i`, except that `integer` is
    /// unset for multiples of 15.
    pub fn with_config(config: EngineConfig) -> Self {
        let catalog = Arc::new(InMemoryCatalog::new(config.clone()));
        let operational = catalog.add_purpose(Purpose::new("operational")).unwrap();
        let marketing = catalog.add_purpose(Purpose::new("marketing")).unwrap();

        let name = Column::new("name", DataType::String);
        let string = Column::new("string", DataType::String);
        let boolean = Column::new("boolean", DataType::Boolean);
        let integer = Column::new("integer", DataType::Integer);
        for column in [&name, &string, &boolean, &integer] {
            catalog.add_column(column.clone()).unwrap();
        }

        let organization_id = Uuid::new_v4();
        let records = (1..=USER_COUNT).map(|i| {
            let mut record = UserRecord::new(organization_id)
                .with_id(user_id(i))
                .with_value(&name, Value::String(format!("user{:02}", i)), [operational])
                .with_value(&string, Value::String(STRINGS[(i % 5) as usize].to_string()), [operational])
                .with_value(&boolean, Value::Bool(i % 2 == 0), [operational]);
            if i % 15 != 0 {
                record = record.with_value(&integer, Value::Int(i as i64), [operational]);
            }
            record
        });
        let users = Arc::new(InMemoryUserStore::with_users(records).unwrap());

        Self {
            config,
            catalog,
            users,
            clock: Arc::new(ManualClock::default()),
            organization_id,
            operational,
            marketing,
            name,
            string,
            boolean,
            integer,
        }
    }

    pub fn builder(&self) -> EngineBuilder {
        Engine::builder(self.catalog.clone(), self.users.clone())
            .config(self.config.clone())
            .clock(self.clock.clone())
    }

    pub fn engine(&self) -> Engine {
        self.builder().build()
    }

    /// Passthrough accessor over every fixture column
    pub fn accessor(&self, access_policy_id: Uuid) -> Accessor {
        self.accessor_for(
            &[&self.name, &self.string, &self.boolean, &self.integer],
            access_policy_id,
        )
    }

    pub fn accessor_for(&self, columns: &[&Column], access_policy_id: Uuid) -> Accessor {
        Accessor {
            id: Uuid::new_v4(),
            name: format!("accessor_{}", Uuid::new_v4().simple()),
            version: 0,
            columns: columns
                .iter()
                .map(|c| ColumnOutputConfig {
                    column_id: c.id,
                    transformer_id: PASSTHROUGH_TRANSFORMER_ID,
                    token_access_policy_id: None,
                })
                .collect(),
            access_policy_id,
            token_access_policy_id: None,
            purposes: vec![self.operational],
            selector_config: SelectorConfig::all(),
            data_life_cycle_state: DataLifeCycleState::Live,
            are_column_access_policies_overridden: false,
            search_index_id: None,
        }
    }

    pub fn add_accessor(&self, accessor: Accessor) -> Uuid {
        self.catalog.add_accessor(accessor).unwrap()
    }

    /// Registers the default allow-all accessor
    pub fn allow_all_accessor(&self) -> Uuid {
        self.add_accessor(self.accessor(ALLOW_ALL_POLICY_ID))
    }

    /// Passthrough mutator writing `columns` for the users whose id is in `?`
    pub fn mutator(&self, columns: &[&Column], access_policy_id: Uuid) -> Mutator {
        Mutator {
            id: Uuid::new_v4(),
            name: format!("mutator_{}", Uuid::new_v4().simple()),
            version: 0,
            columns: columns
                .iter()
                .map(|c| ColumnInputConfig {
                    column_id: c.id,
                    normalizer_id: PASSTHROUGH_TRANSFORMER_ID,
                })
                .collect(),
            access_policy_id,
            selector_config: SelectorConfig::new("{id} = ANY (?)"),
        }
    }

    pub fn add_mutator(&self, mutator: Mutator) -> Uuid {
        self.catalog.add_mutator(mutator).unwrap()
    }
}

pub fn no_context() -> Map<String, Json> {
    Map::new()
}

/// Parses every row of a response
pub fn rows(response: &AccessorResponse) -> Vec<Map<String, Json>> {
    response
        .data
        .iter()
        .map(|row| match serde_json::from_str(row).unwrap() {
            Json::Object(map) => map,
            other => panic!("row is not an object: {}", other),
        })
        .collect()
}

/// Fixture user indices of a response, read back from the `name` column
pub fn indices(response: &AccessorResponse) -> Vec<u128> {
    rows(response)
        .iter()
        .map(|row| {
            let name = row["name"].as_str().unwrap();
            name.trim_start_matches("user").parse().unwrap()
        })
        .collect()
}
