use sqlx::{Executor, PgConnection, Postgres, QueryBuilder};

use crate::defaults::{DEFAULT_GROUPS, default_options};
use crate::models::{Case, CaseCategory, CaseImportRow, LabTestGroup, NewCase, ObservationOption, Slide};

/// How many rows a single bulk-import INSERT carries.
const IMPORT_BATCH_SIZE: usize = 500;

pub async fn list_categories<'e, E>(executor: E) -> Result<Vec<CaseCategory>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, parent_id, name, slug, description, created_at
            FROM case_categories
            ORDER BY name
        "#,
    )
    .fetch_all(executor)
    .await
}

/// List cases, optionally filtered by category slug and a title/history
/// search. Unpublished cases are only returned when `include_unpublished`.
pub async fn list_cases<'e, E>(
    executor: E,
    category_slug: Option<&str>,
    search: Option<&str>,
    include_unpublished: bool,
) -> Result<Vec<Case>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT c.id, c.category_id, c.title, c.history, c.correct_diagnosis,
                   c.explanation, c.published, c.created_at, c.updated_at
            FROM cases c
            LEFT JOIN case_categories cc ON cc.id = c.category_id
            WHERE ($1::text IS NULL OR cc.slug = $1)
              AND ($2::text IS NULL OR c.title ILIKE '%' || $2 || '%' OR c.history ILIKE '%' || $2 || '%')
              AND (c.published OR $3)
            ORDER BY c.id
        "#,
    )
    .bind(category_slug)
    .bind(search)
    .bind(include_unpublished)
    .fetch_all(executor)
    .await
}

pub async fn get_case<'e, E>(executor: E, case_id: i64) -> Result<Option<Case>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, category_id, title, history, correct_diagnosis,
                   explanation, published, created_at, updated_at
            FROM cases
            WHERE id = $1
        "#,
    )
    .bind(case_id)
    .fetch_optional(executor)
    .await
}

/// Create a case and seed its default lab test groups and observation
/// vocabularies in the caller's transaction.
pub async fn create_case_with_defaults(
    conn: &mut PgConnection,
    new: &NewCase,
) -> Result<i64, sqlx::Error> {
    let case_id: i64 = sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            INSERT INTO cases (category_id, title, history, correct_diagnosis, explanation, published)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
        "#,
    )
    .bind(new.category_id)
    .bind(&new.title)
    .bind(&new.history)
    .bind(&new.correct_diagnosis)
    .bind(&new.explanation)
    .bind(new.published)
    .fetch_one(&mut *conn)
    .await?;

    for (position, &(kind, name)) in DEFAULT_GROUPS.iter().enumerate() {
        let group_id: i64 = sqlx::query_scalar(
            // language=PostgreSQL
            r#"
                INSERT INTO lab_test_groups (case_id, kind, name, position)
                VALUES ($1, $2, $3, $4)
                RETURNING id
            "#,
        )
        .bind(case_id)
        .bind(kind)
        .bind(name)
        .bind(position as i32)
        .fetch_one(&mut *conn)
        .await?;

        if let Some(options) = default_options(kind) {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO observation_options (lab_test_group_id, text, is_correct, position) ",
            );
            builder.push_values(options.iter().enumerate(), |mut row, (idx, text)| {
                row.push_bind(group_id)
                    .push_bind(*text)
                    .push_bind(false)
                    .push_bind(idx as i32);
            });
            builder.build().execute(&mut *conn).await?;
        }
    }

    Ok(case_id)
}

pub async fn update_case<'e, E>(executor: E, case_id: i64, new: &NewCase) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE cases
            SET category_id = $2,
                title = $3,
                history = $4,
                correct_diagnosis = $5,
                explanation = $6,
                published = $7,
                updated_at = NOW()
            WHERE id = $1
        "#,
    )
    .bind(case_id)
    .bind(new.category_id)
    .bind(&new.title)
    .bind(&new.history)
    .bind(&new.correct_diagnosis)
    .bind(&new.explanation)
    .bind(new.published)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Delete a case; lab test groups, options, slides, progress and observation
/// logs cascade.
pub async fn delete_case<'e, E>(executor: E, case_id: i64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM cases WHERE id = $1
        "#,
    )
    .bind(case_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn lab_test_groups_for_case<'e, E>(
    executor: E,
    case_id: i64,
) -> Result<Vec<LabTestGroup>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, case_id, kind, name, normal_range, result_text, position
            FROM lab_test_groups
            WHERE case_id = $1
            ORDER BY position, id
        "#,
    )
    .bind(case_id)
    .fetch_all(executor)
    .await
}

pub async fn get_lab_test_group<'e, E>(
    executor: E,
    group_id: i64,
) -> Result<Option<LabTestGroup>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, case_id, kind, name, normal_range, result_text, position
            FROM lab_test_groups
            WHERE id = $1
        "#,
    )
    .bind(group_id)
    .fetch_optional(executor)
    .await
}

/// All options of all groups of one case, ordered for display.
pub async fn options_for_case<'e, E>(
    executor: E,
    case_id: i64,
) -> Result<Vec<ObservationOption>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT o.id, o.lab_test_group_id, o.text, o.is_correct, o.position
            FROM observation_options o
            JOIN lab_test_groups g ON g.id = o.lab_test_group_id
            WHERE g.case_id = $1
            ORDER BY g.position, o.position, o.id
        "#,
    )
    .bind(case_id)
    .fetch_all(executor)
    .await
}

pub async fn options_for_group<'e, E>(
    executor: E,
    group_id: i64,
) -> Result<Vec<ObservationOption>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, lab_test_group_id, text, is_correct, position
            FROM observation_options
            WHERE lab_test_group_id = $1
            ORDER BY position, id
        "#,
    )
    .bind(group_id)
    .fetch_all(executor)
    .await
}

/// Replace the option list of a group with a new answer key.
pub async fn replace_group_options(
    conn: &mut PgConnection,
    group_id: i64,
    options: &[(String, bool)],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM observation_options WHERE lab_test_group_id = $1
        "#,
    )
    .bind(group_id)
    .execute(&mut *conn)
    .await?;

    if options.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "INSERT INTO observation_options (lab_test_group_id, text, is_correct, position) ",
    );
    builder.push_values(
        options.iter().enumerate(),
        |mut row, (idx, (text, is_correct))| {
            row.push_bind(group_id)
                .push_bind(text)
                .push_bind(*is_correct)
                .push_bind(idx as i32);
        },
    );
    builder.build().execute(&mut *conn).await?;

    Ok(())
}

pub async fn slides_for_case<'e, E>(executor: E, case_id: i64) -> Result<Vec<Slide>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, case_id, image_path, description, position
            FROM slides
            WHERE case_id = $1
            ORDER BY position, id
        "#,
    )
    .bind(case_id)
    .fetch_all(executor)
    .await
}

/// Best-effort bulk insert of import rows. Rows missing a required field are
/// skipped; duplicate titles are silently ignored. Returns
/// `(created, skipped)` where `skipped` counts invalid rows only.
pub async fn import_cases(
    conn: &mut PgConnection,
    rows: &[CaseImportRow],
) -> Result<(u64, u64), sqlx::Error> {
    let valid: Vec<_> = rows.iter().filter_map(CaseImportRow::required_fields).collect();
    let skipped = (rows.len() - valid.len()) as u64;

    let mut created = 0;
    for chunk in valid.chunks(IMPORT_BATCH_SIZE) {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO cases (title, history, correct_diagnosis, explanation) ");
        builder.push_values(chunk, |mut row, (title, history, diagnosis, explanation)| {
            row.push_bind(title)
                .push_bind(history)
                .push_bind(diagnosis)
                .push_bind(explanation);
        });
        builder.push(" ON CONFLICT (title) DO NOTHING");
        created += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok((created, skipped))
}
