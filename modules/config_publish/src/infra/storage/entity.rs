//! SeaORM entities for database tables

/// Published artifacts, one live row per identity
pub mod artifact {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "configuration")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub cfg_id: i64,

        /// Canonical selector string (part of the identity)
        pub selectors: String,

        /// Canonical optional selector string (part of the identity)
        pub optional_selectors: String,

        pub cfg_group: String,

        pub cfg_key: String,

        /// Rendered version tag
        pub cfg_version: String,

        /// Encoded wire payload
        pub raw_cfg_value: Vec<u8>,

        pub content_digest: String,

        pub cfg_status: i64,

        pub time_created: DateTimeUtc,

        pub time_updated: DateTimeUtc,

        /// Monotonic change counter observed by pollers
        pub sequence: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Editor-facing configuration rows
pub mod config_edit {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "config_edit")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub config_id: i64,
        pub cfg_app: String,
        pub cfg_env: String,
        pub cfg_dc: String,
        pub cfg_namespace: String,
        pub cfg_key: String,
        pub content_type: String,
        pub content: Vec<u8>,
        pub cfg_version: String,
        pub cfg_status: i64,
        pub time_created: DateTimeUtc,
        pub time_updated: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Named counters for backends without native sequences
pub mod sequence_counter {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "sequence_counter")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub name: String,
        /// Last issued value
        pub current: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Mutual-exclusion rows for backends without advisory locks
pub mod publish_lock {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "publish_lock")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub name: String,
        pub acquired_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
