// Table Catalog (C4) - compile-time metadata for every logical table.
//
// Values are immutable process-wide configuration; there is no runtime
// mutation path. Lookup is O(1), enumeration is O(n).
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Raw,
    Dimension,
    Aux,
    Mart,
}

impl Layer {
    fn schema_prefix(&self) -> &'static str {
        match self {
            Layer::Raw => "raw",
            Layer::Dimension => "raw",
            Layer::Aux => "aux",
            Layer::Mart => "mart",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    Incremental,
    FullRefresh,
}

#[derive(Debug, Clone)]
pub struct TableConfig {
    pub name: &'static str,
    pub layer: Layer,
    pub primary_key: &'static [&'static str],
    pub incremental_column: Option<&'static str>,
    pub default_mode: ExtractionMode,
    pub lookback_days: u32,
    pub batch_size: usize,
    pub refresh_frequency_hours: u32,
    pub source_identifier: &'static str,
    pub sql_template: &'static str,
}

impl TableConfig {
    /// Fully-qualified sink name: `<layer_prefix>_<project_uid>.<name>`.
    pub fn fq_name(&self, project_uid: &str) -> String {
        format!("{}_{}.{}", self.layer.schema_prefix(), project_uid, self.name)
    }
}

pub struct TableCatalog {
    tables: HashMap<&'static str, TableConfig>,
}

impl TableCatalog {
    pub fn get(&self, name: &str) -> Option<&TableConfig> {
        self.tables.get(name)
    }

    pub fn require(&self, name: &str) -> crate::Result<&TableConfig> {
        self.get(name)
            .ok_or_else(|| crate::EtlError::UnknownTable(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.keys().copied()
    }

    /// The logical tables the per-campaign pipeline loads in parallel (C10).
    pub fn raw_tables(&self) -> impl Iterator<Item = &TableConfig> + '_ {
        self.tables
            .values()
            .filter(|t| matches!(t.layer, Layer::Raw | Layer::Dimension))
    }

    fn validate(tables: HashMap<&'static str, TableConfig>) -> Self {
        for config in tables.values() {
            debug_assert!(
                !(config.default_mode == ExtractionMode::Incremental
                    && config.incremental_column.is_none()),
                "table {} declares Incremental mode but has no incremental_column",
                config.name
            );
        }
        Self { tables }
    }
}

const ASSIGNMENTS_SQL: &str = include_str!("../sql/raw/assignments.sql");
const DEBTS_SQL: &str = include_str!("../sql/raw/debts.sql");
const PAYMENTS_SQL: &str = include_str!("../sql/raw/payments.sql");
const BOT_INTERACTIONS_SQL: &str = include_str!("../sql/raw/bot_interactions.sql");
const HUMAN_INTERACTIONS_SQL: &str = include_str!("../sql/raw/human_interactions.sql");
const HOMOLOGATION_BOT_SQL: &str = include_str!("../sql/raw/homologation_bot.sql");
const HOMOLOGATION_HUMAN_SQL: &str = include_str!("../sql/raw/homologation_human.sql");
const AGENTS_SQL: &str = include_str!("../sql/raw/agents.sql");
const CALENDAR_SQL: &str = include_str!("../sql/raw/calendar.sql");

fn build_catalog() -> TableCatalog {
    let mut tables = HashMap::new();

    tables.insert(
        "assignments",
        TableConfig {
            name: "assignments",
            layer: Layer::Raw,
            primary_key: &["cod_luna", "cuenta", "archivo"],
            incremental_column: Some("creado_el"),
            default_mode: ExtractionMode::Incremental,
            lookback_days: 7,
            batch_size: 50_000,
            refresh_frequency_hours: 6,
            source_identifier: "batch_assignment",
            sql_template: ASSIGNMENTS_SQL,
        },
    );

    tables.insert(
        "debts",
        TableConfig {
            name: "debts",
            layer: Layer::Raw,
            primary_key: &["cod_cuenta", "nro_documento", "archivo", "fecha_proceso"],
            incremental_column: Some("creado_el"),
            default_mode: ExtractionMode::Incremental,
            lookback_days: 7,
            batch_size: 100_000,
            refresh_frequency_hours: 6,
            source_identifier: "batch_tran_deuda",
            sql_template: DEBTS_SQL,
        },
    );

    tables.insert(
        "payments",
        TableConfig {
            name: "payments",
            layer: Layer::Raw,
            primary_key: &["nro_documento", "fecha_pago", "monto_cancelado"],
            incremental_column: Some("creado_el"),
            default_mode: ExtractionMode::Incremental,
            lookback_days: 7,
            batch_size: 25_000,
            refresh_frequency_hours: 6,
            source_identifier: "batch_pagos",
            sql_template: PAYMENTS_SQL,
        },
    );

    tables.insert(
        "bot_interactions",
        TableConfig {
            name: "bot_interactions",
            layer: Layer::Raw,
            primary_key: &["uid"],
            incremental_column: Some("date"),
            default_mode: ExtractionMode::Incremental,
            lookback_days: 7,
            batch_size: 50_000,
            refresh_frequency_hours: 6,
            source_identifier: "sync_voicebot_batch",
            sql_template: BOT_INTERACTIONS_SQL,
        },
    );

    tables.insert(
        "human_interactions",
        TableConfig {
            name: "human_interactions",
            layer: Layer::Raw,
            primary_key: &["uid"],
            incremental_column: Some("date"),
            default_mode: ExtractionMode::Incremental,
            lookback_days: 7,
            batch_size: 50_000,
            refresh_frequency_hours: 6,
            source_identifier: "sync_mibotair_batch",
            sql_template: HUMAN_INTERACTIONS_SQL,
        },
    );

    tables.insert(
        "homologation_bot",
        TableConfig {
            name: "homologation_bot",
            layer: Layer::Dimension,
            primary_key: &["bot_management", "bot_sub_management", "bot_compromiso"],
            incremental_column: None,
            default_mode: ExtractionMode::FullRefresh,
            lookback_days: 0,
            batch_size: 10_000,
            refresh_frequency_hours: 24,
            source_identifier: "homologacion_voicebot",
            sql_template: HOMOLOGATION_BOT_SQL,
        },
    );

    tables.insert(
        "homologation_human",
        TableConfig {
            name: "homologation_human",
            layer: Layer::Dimension,
            primary_key: &["n_1", "n_2", "n_3"],
            incremental_column: None,
            default_mode: ExtractionMode::FullRefresh,
            lookback_days: 0,
            batch_size: 10_000,
            refresh_frequency_hours: 24,
            source_identifier: "homologacion_mibotair",
            sql_template: HOMOLOGATION_HUMAN_SQL,
        },
    );

    tables.insert(
        "agents",
        TableConfig {
            name: "agents",
            layer: Layer::Dimension,
            primary_key: &["correo_name"],
            incremental_column: None,
            default_mode: ExtractionMode::FullRefresh,
            lookback_days: 0,
            batch_size: 10_000,
            refresh_frequency_hours: 24,
            source_identifier: "sync_mibotair_batch_SYS_user",
            sql_template: AGENTS_SQL,
        },
    );

    tables.insert(
        "calendar",
        TableConfig {
            name: "calendar",
            layer: Layer::Raw,
            primary_key: &["archivo"],
            incremental_column: Some("fecha_apertura"),
            default_mode: ExtractionMode::Incremental,
            lookback_days: 0,
            batch_size: 1_000,
            refresh_frequency_hours: 1,
            source_identifier: "dash_calendario",
            sql_template: CALENDAR_SQL,
        },
    );

    TableCatalog::validate(tables)
}

static CATALOG: OnceLock<TableCatalog> = OnceLock::new();

pub fn catalog() -> &'static TableCatalog {
    CATALOG.get_or_init(build_catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_incremental_table_has_incremental_column() {
        for name in catalog().names() {
            let config = catalog().require(name).unwrap();
            if config.default_mode == ExtractionMode::Incremental {
                assert!(
                    config.incremental_column.is_some(),
                    "table {name} is incremental but has no incremental_column"
                );
            }
        }
    }

    #[test]
    fn fq_name_uses_layer_prefix() {
        let assignments = catalog().require("assignments").unwrap();
        assert_eq!(assignments.fq_name("p3fv"), "raw_p3fv.assignments");

        let homologation = catalog().require("homologation_bot").unwrap();
        assert_eq!(homologation.fq_name("p3fv"), "raw_p3fv.homologation_bot");
    }

    #[test]
    fn unknown_table_is_an_error_not_a_panic() {
        assert!(catalog().require("does_not_exist").is_err());
    }

    #[test]
    fn raw_tables_excludes_the_calendar_only_by_layer_not_name() {
        let names: Vec<_> = catalog().raw_tables().map(|t| t.name).collect();
        assert!(names.contains(&"assignments"));
        assert!(names.contains(&"homologation_bot"));
    }
}
