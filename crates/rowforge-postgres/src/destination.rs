use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use rowforge_core::{
    CellValue, ColumnKind, ColumnMetadata, Destination, Error, GeneratedRow, Result, TableMetadata,
};

/// Write side: renders the categorical model back to DDL/DML.
///
/// Created tables carry the primary-key clause but no foreign-key
/// constraints; referential integrity is kept by the two-pass loader instead
/// of deferred-constraint support.
#[derive(Debug, Clone)]
pub struct PostgresDestination {
    pool: PgPool,
    schema: String,
}

impl PostgresDestination {
    /// Destination in the `public` schema.
    pub fn new(pool: PgPool) -> Self {
        Self::with_schema(pool, "public")
    }

    pub fn with_schema(pool: PgPool, schema: &str) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
        }
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(table))
    }
}

#[async_trait]
impl Destination for PostgresDestination {
    async fn create_table(&self, table: &TableMetadata) -> Result<()> {
        let mut parts: Vec<String> = table.columns.iter().map(render_column).collect();
        if !table.primary_key.is_empty() {
            let key = table
                .primary_key
                .iter()
                .map(|name| quote_ident(name))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("primary key ({key})"));
        }

        let sql = format!(
            "create table if not exists {} ({})",
            self.qualified(&table.name),
            parts.join(", ")
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn insert_row(&self, table: &TableMetadata, row: &GeneratedRow) -> Result<()> {
        let columns: Vec<&ColumnMetadata> = table
            .columns
            .iter()
            .filter(|column| !column.is_identity)
            .collect();
        if columns.is_empty() {
            return Ok(());
        }

        let names = columns
            .iter()
            .map(|column| quote_ident(&column.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|n| format!("${n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "insert into {} ({names}) values ({placeholders})",
            self.qualified(&table.name)
        );

        let mut query = sqlx::query(&sql);
        for column in &columns {
            let value = row.get(&column.name).cloned().unwrap_or(CellValue::Null);
            query = bind_cell(query, column, &value)?;
        }
        query.execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn update_foreign_key(
        &self,
        table: &TableMetadata,
        fk_column: &str,
        key: &[(String, CellValue)],
        value: &CellValue,
    ) -> Result<()> {
        let fk_meta = table
            .column(fk_column)
            .ok_or_else(|| Error::Destination(format!("unknown column {fk_column}")))?;

        let mut predicates = Vec::with_capacity(key.len());
        for (index, (name, _)) in key.iter().enumerate() {
            predicates.push(format!("{} = ${}", quote_ident(name), index + 2));
        }
        let sql = format!(
            "update {} set {} = $1 where {}",
            self.qualified(&table.name),
            quote_ident(fk_column),
            predicates.join(" and ")
        );

        let mut query = bind_cell(sqlx::query(&sql), fk_meta, value)?;
        for (name, key_value) in key {
            let key_meta = table
                .column(name)
                .ok_or_else(|| Error::Destination(format!("unknown key column {name}")))?;
            query = bind_cell(query, key_meta, key_value)?;
        }
        query.execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn alter_column_nullability(
        &self,
        table: &str,
        column: &str,
        nullable: bool,
    ) -> Result<()> {
        let action = if nullable {
            "drop not null"
        } else {
            "set not null"
        };
        let sql = format!(
            "alter table {} alter column {} {action}",
            self.qualified(table),
            quote_ident(column)
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn key_values(
        &self,
        table: &str,
        column: &str,
        kind: ColumnKind,
    ) -> Result<Vec<CellValue>> {
        let ident = quote_ident(column);
        let sql = format!(
            "select {ident}{} from {} where {ident} is not null order by 1",
            decode_cast(kind),
            self.qualified(table)
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let value = match kind {
                ColumnKind::Integer => CellValue::Int(row.try_get(0).map_err(db_err)?),
                ColumnKind::Decimal => CellValue::Float(row.try_get(0).map_err(db_err)?),
                ColumnKind::Boolean => CellValue::Bool(row.try_get(0).map_err(db_err)?),
                ColumnKind::Timestamp => CellValue::Timestamp(row.try_get(0).map_err(db_err)?),
                ColumnKind::Uuid => CellValue::Uuid(row.try_get(0).map_err(db_err)?),
                ColumnKind::Text => CellValue::Text(row.try_get(0).map_err(db_err)?),
            };
            values.push(value);
        }
        Ok(values)
    }

    async fn max_integer(&self, table: &str, column: &str) -> Result<Option<i64>> {
        let sql = format!(
            "select max({}::bigint) from {}",
            quote_ident(column),
            self.qualified(table)
        );
        sqlx::query_scalar::<_, Option<i64>>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}

fn db_err(err: sqlx::Error) -> Error {
    Error::Destination(err.to_string())
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn render_column(column: &ColumnMetadata) -> String {
    let mut sql = format!("{} {}", quote_ident(&column.name), sql_type(column));
    if column.is_identity {
        sql.push_str(" generated by default as identity");
    }
    if !column.is_nullable {
        sql.push_str(" not null");
    }
    sql
}

fn sql_type(column: &ColumnMetadata) -> String {
    match column.kind {
        ColumnKind::Integer => "bigint".to_string(),
        ColumnKind::Decimal => "double precision".to_string(),
        ColumnKind::Boolean => "boolean".to_string(),
        ColumnKind::Timestamp => "timestamp".to_string(),
        ColumnKind::Uuid => "uuid".to_string(),
        ColumnKind::Text => match column.max_length {
            Some(max) => format!("varchar({max})"),
            None => "text".to_string(),
        },
    }
}

/// Cast appended to key-value reads so decoding is uniform per categorical
/// kind regardless of the column's native width.
fn decode_cast(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer => "::bigint",
        ColumnKind::Decimal => "::float8",
        ColumnKind::Uuid | ColumnKind::Text => "::text",
        ColumnKind::Boolean | ColumnKind::Timestamp => "",
    }
}

/// Bind a cell on its column's declared kind; a typed NULL is bound when the
/// value is absent so Postgres can infer the parameter type.
fn bind_cell<'q>(
    query: Query<'q, Postgres, PgArguments>,
    column: &ColumnMetadata,
    value: &CellValue,
) -> Result<Query<'q, Postgres, PgArguments>> {
    if value.is_null() {
        return Ok(match column.kind {
            ColumnKind::Integer => query.bind(None::<i64>),
            ColumnKind::Decimal => query.bind(None::<f64>),
            ColumnKind::Boolean => query.bind(None::<bool>),
            ColumnKind::Timestamp => query.bind(None::<chrono::NaiveDateTime>),
            ColumnKind::Uuid => query.bind(None::<uuid::Uuid>),
            ColumnKind::Text => query.bind(None::<String>),
        });
    }

    let coerced = value.coerce_to(column.kind).ok_or_else(|| {
        Error::Destination(format!(
            "value {value:?} cannot be bound as {:?} for column {}",
            column.kind, column.name
        ))
    })?;

    Ok(match coerced {
        CellValue::Int(int) => query.bind(int),
        CellValue::Float(float) => query.bind(float),
        CellValue::Bool(flag) => query.bind(flag),
        CellValue::Timestamp(ts) => query.bind(ts),
        CellValue::Uuid(raw) => {
            let parsed = uuid::Uuid::parse_str(&raw).map_err(|err| {
                Error::Destination(format!("invalid uuid for column {}: {err}", column.name))
            })?;
            query.bind(parsed)
        }
        CellValue::Text(text) => query.bind(text),
        CellValue::Null => query.bind(None::<String>),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, kind: ColumnKind) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            kind,
            max_length: None,
            is_nullable: true,
            is_identity: false,
            is_free_text: false,
        }
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn column_rendering_covers_identity_and_length() {
        let mut id = column("id", ColumnKind::Integer);
        id.is_identity = true;
        id.is_nullable = false;
        assert_eq!(
            render_column(&id),
            "\"id\" bigint generated by default as identity not null"
        );

        let mut code = column("code", ColumnKind::Text);
        code.max_length = Some(16);
        assert_eq!(render_column(&code), "\"code\" varchar(16)");

        assert_eq!(render_column(&column("bio", ColumnKind::Text)), "\"bio\" text");
    }
}
