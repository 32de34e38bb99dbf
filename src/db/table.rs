use regex::Regex;
use std::sync::OnceLock;

use crate::error::StoreError;

/// 可写表及其列白名单
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Requests,
    Articles,
    Awnings,
    AwningsFieldsConfigs,
    Groups,
    Fields,
    FieldsConfigs,
    FieldsSubconfigs,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Requests => "REQUESTS",
            Table::Articles => "ARTICLES",
            Table::Awnings => "AWNINGS",
            Table::AwningsFieldsConfigs => "AWNINGS_FIELDS_CONFIGS",
            Table::Groups => "GROUPS",
            Table::Fields => "FIELDS",
            Table::FieldsConfigs => "FIELDS_CONFIGS",
            Table::FieldsSubconfigs => "FIELDS_SUBCONFIGS",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Requests => &[
                "ID",
                "TYPE",
                "CLIENT_NUMBER",
                "CLIENT_NAME",
                "EMAIL",
                "ADDRESS",
                "ARTICLES",
                "RESUME",
                "DELIVERY_DATE",
                "REFERENCE",
                "NUMBER",
                "ACTIVE",
            ],
            Table::Articles => &["ARTICLE", "FAMILY_CODE", "SALE_PRICE", "LON_RATE"],
            Table::Awnings => &["ID", "VALUE", "AWNING_MODEL_ID"],
            Table::AwningsFieldsConfigs => &["ID", "AWNING_ID", "FIELD_CONFIG_ID"],
            Table::Groups => &["ID", "NAME", "ORDER"],
            Table::Fields => &[
                "ID",
                "NAME",
                "DESCRIPTION",
                "ORDER",
                "GROUP_ID",
                "SAVE_ON_REQUEST",
                "DELFOS_ID",
            ],
            Table::FieldsConfigs => &["ID", "FIELD_ID"],
            Table::FieldsSubconfigs => &[
                "ID",
                "FIELD_CONFIG_ID",
                "DATA_UNIT",
                "DB_SELECT",
                "HOVER_TEXT",
                "LINKED_ACTIVE",
                "LINKED_SAME_DEFAULT_UNTOUCHED",
                "LINKED_SAME_ON_VALIDATE",
                "POPUP",
                "SELECT",
                "SHOW_NAME",
                "REQUIRED",
                "SIZE",
                "TYPE",
                "VALUE",
            ],
        }
    }

    pub fn has_column(self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    /// 校验并返回白名单中的静态列名
    pub fn column(self, column: &str) -> Result<&'static str, StoreError> {
        self.columns()
            .iter()
            .find(|c| **c == column)
            .copied()
            .ok_or_else(|| StoreError::UnknownColumn {
                table: self.name(),
                column: column.to_string(),
            })
    }
}

fn ident_regex() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("ident regex is valid"))
}

/// 带引号的 SQL 标识符; 只接受简单标识符
pub fn quote_ident(ident: &str) -> Result<String, StoreError> {
    if ident.len() > 63 || !ident_regex().is_match(ident) {
        return Err(StoreError::InvalidIdentifier(ident.to_string()));
    }
    Ok(format!("\"{}\"", ident))
}
