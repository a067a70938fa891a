//! Integration tests for the repository layer
//!
//! These tests drive derived entities through a scripted executor and check:
//! - The SQL emitted for reads, aggregates and writes
//! - Joins attached for remote columns
//! - Hydration of value types and nested entities
//! - Grid paging, sorting and filtering

use std::collections::VecDeque;

use assert_matches::assert_matches;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use quickfeather::orm::{ForeignKey, RawRow};
use quickfeather::types::{BoundedString, Date, Email, PgArray, Point};
use quickfeather::{
    Entity, EntityError, EntityManager, Error, Fetch, GridParameters, Repository, SqlError,
    SqlExecutor, SqlValue, Statement,
};
use serde::Serialize;

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Entity)]
#[entity(source = "blog.authors")]
pub struct Author {
    #[column(primary_key)]
    pub id: Option<i64>,
    pub name: BoundedString<100>,
    pub email: Option<Email>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Entity)]
#[entity(source = "blog.articles")]
pub struct Article {
    #[column(primary_key)]
    pub id: Option<i64>,
    pub title: BoundedString<200>,
    #[column(name = "is_published")]
    pub published: bool,
    pub published_on: Option<Date>,
    pub tags: Option<PgArray>,
    pub location: Option<Point>,
    pub author_id: Option<ForeignKey<Author>>,
    #[column(table = "blog.authors", name = "name", join = "authors.id = author_id")]
    pub author_name: Option<String>,
    #[column(
        table = "blog.authors",
        name = "row_to_json(authors)",
        join = "authors.id = author_id"
    )]
    pub author: Option<Author>,
}

impl Article {
    fn draft(title: &str) -> Self {
        Self {
            id: None,
            title: BoundedString::new(title).unwrap(),
            published: false,
            published_on: None,
            tags: None,
            location: None,
            author_id: None,
            author_name: None,
            author: None,
        }
    }
}

fn row(pairs: &[(&str, Option<&str>)]) -> RawRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
        .collect()
}

/// Answers each read with the next scripted result set.
#[derive(Debug, Default)]
struct ScriptedExecutor {
    statements: Vec<Statement>,
    results: VecDeque<Vec<RawRow>>,
    affected: u64,
}

impl ScriptedExecutor {
    fn new(results: Vec<Vec<RawRow>>) -> Self {
        Self {
            results: results.into(),
            ..Self::default()
        }
    }

    fn affecting(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    fn sql(&self, index: usize) -> &str {
        &self.statements[index].sql
    }
}

#[async_trait]
impl SqlExecutor for ScriptedExecutor {
    async fn fetch_all(&mut self, statement: &Statement) -> quickfeather::Result<Vec<RawRow>> {
        self.statements.push(statement.clone());
        Ok(self.results.pop_front().unwrap_or_default())
    }

    async fn fetch_optional(
        &mut self,
        statement: &Statement,
    ) -> quickfeather::Result<Option<RawRow>> {
        self.statements.push(statement.clone());
        Ok(self
            .results
            .pop_front()
            .and_then(|rows| rows.into_iter().next()))
    }

    async fn execute(&mut self, statement: &Statement) -> quickfeather::Result<u64> {
        self.statements.push(statement.clone());
        Ok(self.affected)
    }
}

// ============================================================================
// Reads
// ============================================================================

mod reads {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_hydrates_value_types() {
        let mut executor = ScriptedExecutor::new(vec![vec![row(&[
            ("id", Some("11")),
            ("title", Some("Parsing without tears")),
            ("published", Some("t")),
            ("published_on", Some("2024-03-01")),
            ("tags", Some("{rust,\"sql builder\",NULL}")),
            ("location", Some("(50.08,14.42)")),
            ("author_id", Some("3")),
        ])]]);

        let mut repo = Repository::<Article, _>::new(&mut executor).unwrap();
        let articles = repo.get_list(Fetch::new()).await.unwrap();

        assert_eq!(articles.len(), 1);
        let article = &articles[0];
        assert_eq!(article.id, Some(11));
        assert_eq!(article.title.as_str(), "Parsing without tears");
        assert!(article.published);
        assert_eq!(
            article
                .published_on
                .as_ref()
                .map(|d| d.to_string())
                .as_deref(),
            Some("01.03.2024")
        );
        let tags = article.tags.as_ref().unwrap();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags.first(), Some("rust"));
        assert_eq!(tags.values()[2], None);
        assert_eq!(article.location.map(|p| p.latitude()), Some(50.08));
        assert_eq!(article.author_id.map(|fk| fk.id()), Some(3));
        assert_eq!(article.author_name, None);
        assert_eq!(article.author, None);

        let sql = executor.sql(0);
        assert!(sql.starts_with("SELECT CAST(blog.articles.id AS text) AS \"id\","));
        assert!(sql.contains("CAST(blog.articles.is_published AS text) AS \"published\""));
        assert!(!sql.contains("JOIN"));
        assert!(sql.ends_with(" FROM blog.articles"));
    }

    #[tokio::test]
    async fn test_remote_columns_share_one_join() {
        let mut executor = ScriptedExecutor::new(vec![vec![row(&[
            ("id", Some("11")),
            ("title", Some("Joins")),
            ("published", Some("false")),
            ("author_id", Some("3")),
            ("author_name", Some("Jan Novák")),
            (
                "author",
                Some(r#"{"id": 3, "name": "Jan Novák", "email": null}"#),
            ),
        ])]]);

        let mut repo = Repository::<Article, _>::new(&mut executor).unwrap();
        let article = repo
            .get_one(
                Fetch::new()
                    .filter("author_id = 3 AND published")
                    .add_column(ArticleField::AuthorName)
                    .add_column(ArticleField::Author),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(article.author_name.as_deref(), Some("Jan Novák"));
        let author = article.author.unwrap();
        assert_eq!(author.id, Some(3));
        assert_eq!(author.name.as_str(), "Jan Novák");
        assert_eq!(author.email, None);

        let sql = executor.sql(0);
        assert_eq!(sql.matches("LEFT JOIN").count(), 1);
        assert!(sql.contains(" LEFT JOIN blog.authors ON authors.id = blog.articles.author_id"));
        assert!(sql.contains("CAST(row_to_json(authors) AS text) AS \"author\""));
        assert!(
            sql.ends_with(
                "WHERE blog.articles.author_id = 3 AND blog.articles.is_published LIMIT 1"
            )
        );
    }

    #[tokio::test]
    async fn test_get_one_by_id_misses() {
        let mut executor = ScriptedExecutor::default();
        let mut repo = Repository::<Author, _>::new(&mut executor).unwrap();
        assert_eq!(repo.get_one_by_id(99, &[]).await.unwrap(), None);
        assert!(
            executor
                .sql(0)
                .ends_with("FROM blog.authors WHERE blog.authors.id = 99 LIMIT 1")
        );
    }

    #[tokio::test]
    async fn test_bad_column_names_the_field() {
        let mut executor = ScriptedExecutor::new(vec![vec![row(&[
            ("id", Some("1")),
            ("title", Some("Broken")),
            ("published", Some("maybe")),
        ])]]);

        let mut repo = Repository::<Article, _>::new(&mut executor).unwrap();
        let err = repo.get_list(Fetch::new()).await.unwrap_err();
        assert_matches!(
            err,
            Error::Entity(EntityError { entity: "Article", ref filter, .. })
                if filter.as_deref() == Some("published")
        );
    }

    #[tokio::test]
    async fn test_missing_required_column() {
        let mut executor = ScriptedExecutor::new(vec![vec![row(&[("id", Some("1"))])]]);
        let mut repo = Repository::<Author, _>::new(&mut executor).unwrap();
        let err = repo.get_list(Fetch::new()).await.unwrap_err();
        assert_matches!(err, Error::Entity(EntityError { ref filter, .. }) if filter.as_deref() == Some("name"));
    }
}

// ============================================================================
// Aggregates and grids
// ============================================================================

mod grids {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_grid_page_and_count() {
        let mut executor = ScriptedExecutor::new(vec![
            vec![row(&[
                ("id", Some("5")),
                ("title", Some("Grids")),
                ("published", Some("true")),
            ])],
            vec![row(&[("value", Some("41"))])],
        ]);

        let parameters: GridParameters = serde_json::from_str(
            r#"{"order": {"title": "asc"}, "condition": {"author_name": "novak"}, "count": 10, "from": 20}"#,
        )
        .unwrap();

        let mut repo = Repository::<Article, _>::new(&mut executor).unwrap();
        let (page, total) = repo
            .get_list_by_parameters(&parameters, Fetch::new().filter("published"))
            .await
            .unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(total, 41);

        let filter = "WHERE ((blog.articles.is_published) AND \
(unaccent((authors.name)::varchar) ILIKE unaccent('%novak%')))";
        let list = executor.sql(0);
        assert!(list.contains(" LEFT JOIN blog.authors ON authors.id = blog.articles.author_id"));
        assert!(list.contains(filter));
        assert!(list.ends_with("ORDER BY blog.articles.title ASC LIMIT 10 OFFSET 20"));

        let count = executor.sql(1);
        assert!(count.starts_with("SELECT count(*) AS \"value\" FROM blog.articles LEFT JOIN"));
        assert!(count.ends_with(filter));
    }

    #[tokio::test]
    async fn test_grid_orders_by_joined_column() {
        let mut executor = ScriptedExecutor::new(vec![vec![], vec![row(&[("value", Some("0"))])]]);

        let parameters: GridParameters = serde_json::from_str(
            r#"{"order": {"author_name": "desc"}, "condition": {"author_name": "dvorak"}}"#,
        )
        .unwrap();

        let mut repo = Repository::<Article, _>::new(&mut executor).unwrap();
        let (page, total) = repo
            .get_list_by_parameters(&parameters, Fetch::new())
            .await
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 0);

        let filter = "WHERE (unaccent((authors.name)::varchar) ILIKE unaccent('%dvorak%'))";
        let list = executor.sql(0);
        assert!(list.ends_with(&format!("{filter} ORDER BY authors.name DESC")));
        assert!(!list.contains("blog.articles.name"));
        assert!(executor.sql(1).ends_with(filter));
    }

    #[tokio::test]
    async fn test_grouped_grid_counts_groups() {
        let mut executor = ScriptedExecutor::new(vec![vec![], vec![row(&[("value", Some("3"))])]]);

        let mut repo = Repository::<Article, _>::new(&mut executor).unwrap();
        let (_, total) = repo
            .get_list_by_parameters(
                &GridParameters::default(),
                Fetch::new().group_by("author_id"),
            )
            .await
            .unwrap();
        assert_eq!(total, 3);

        assert_eq!(
            executor.sql(1),
            "SELECT count(*) AS \"value\" FROM (SELECT count(*) AS \"value\" \
FROM blog.articles GROUP BY blog.articles.author_id) t"
        );
    }

    #[tokio::test]
    async fn test_aggregates() {
        let mut executor = ScriptedExecutor::new(vec![vec![row(&[("value", Some("7"))])], vec![]]);
        let mut repo = Repository::<Article, _>::new(&mut executor).unwrap();

        assert_eq!(
            repo.get_count(Fetch::new().filter("published"))
                .await
                .unwrap(),
            7
        );
        assert_eq!(
            repo.get_aggregate("max(published_on)", Fetch::new())
                .await
                .unwrap(),
            "0"
        );
        assert_eq!(
            executor.sql(1),
            "SELECT max(blog.articles.published_on) AS \"value\" FROM blog.articles"
        );
    }
}

// ============================================================================
// Writes
// ============================================================================

mod writes {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_insert_binds_local_columns() {
        let mut executor = ScriptedExecutor::new(vec![vec![row(&[("id", Some("12"))])]]);
        let mut repo = Repository::<Article, _>::new(&mut executor).unwrap();

        let mut article = Article::draft("Hello");
        article.published = true;
        article.tags = Some(["rust", "orm"].into_iter().map(String::from).collect());
        article.location = Some(Point::new(50.08, 14.42).unwrap());
        article.author_id = Some(ForeignKey::new(7));
        article.author_name = Some("ignored".into());

        assert_eq!(repo.insert(&article).await.unwrap(), Some(12));

        let statement = &executor.statements[0];
        assert_eq!(
            statement.sql,
            "INSERT INTO blog.articles (\"title\",\"is_published\",\"published_on\",\"tags\",\"location\",\"author_id\") \
VALUES ($1,$2,null,$3,$4::point,$5) RETURNING id;"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::Text("Hello".into()),
                SqlValue::Bool(true),
                SqlValue::TextArray(vec![Some("rust".into()), Some("orm".into())]),
                SqlValue::Cast {
                    text: "(50.08,14.42)".into(),
                    type_name: "point",
                },
                SqlValue::Int(7),
            ]
        );
    }

    #[tokio::test]
    async fn test_update_translates_filter() {
        let mut executor = ScriptedExecutor::default().affecting(2);
        let mut repo = Repository::<Author, _>::new(&mut executor).unwrap();

        let author = Author {
            id: None,
            name: BoundedString::new("Eva").unwrap(),
            email: None,
        };
        assert!(repo.update(&author, "name = 'Eve'").await.unwrap());
        assert_eq!(
            executor.sql(0),
            "UPDATE blog.authors SET \"name\" = $1,\"email\" = null WHERE blog.authors.name = 'Eve'"
        );
    }

    #[tokio::test]
    async fn test_delete_entity_needs_id() {
        let mut executor = ScriptedExecutor::default();
        let mut repo = Repository::<Article, _>::new(&mut executor).unwrap();
        let err = repo
            .delete_entity(&Article::draft("Gone"))
            .await
            .unwrap_err();
        assert_matches!(err, Error::Sql(SqlError::MissingId { entity: "Article" }));
        assert!(executor.statements.is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_nothing_removed() {
        let mut executor = ScriptedExecutor::default();
        let mut repo = Repository::<Article, _>::new(&mut executor).unwrap();
        assert!(!repo.delete_by_id(4).await.unwrap());
        assert_eq!(
            executor.sql(0),
            "DELETE FROM blog.articles WHERE blog.articles.id = 4"
        );
    }
}

// ============================================================================
// Entity manager
// ============================================================================

mod manager {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_manager_dispatches_by_entity_type() {
        let mut executor = ScriptedExecutor::new(vec![
            vec![row(&[
                ("id", Some("3")),
                ("name", Some("Jan")),
                ("email", Some("jan@example.com")),
            ])],
            vec![row(&[("value", Some("2"))])],
        ]);

        let mut manager = EntityManager::new(&mut executor);
        let author = manager.get_one_by_id::<Author>(3).await.unwrap().unwrap();
        assert_eq!(
            author.email.as_ref().map(|e| e.as_str()),
            Some("jan@example.com")
        );

        let count = manager
            .get_count::<Article>(Fetch::new().filter("author_id = 3"))
            .await
            .unwrap();
        assert_eq!(count, 2);

        assert!(executor.sql(0).contains("FROM blog.authors"));
        assert!(executor.sql(1).contains("FROM blog.articles"));
    }

    #[test]
    fn test_to_json() {
        let mut executor = ScriptedExecutor::default();
        let repo = Repository::<Author, _>::new(&mut executor).unwrap();
        let author = Author {
            id: Some(3),
            name: BoundedString::new("Jan").unwrap(),
            email: None,
        };
        assert_eq!(
            repo.to_json(&author).unwrap(),
            r#"{"id":3,"name":"Jan","email":null}"#
        );
    }
}
