//! Query builder and specification composition tests.

use storefront_dal::db::{QueryBuilder, QueryParam};
use storefront_dal::params;
use storefront_dal::specifications::{
    Category, Ordering, Pagination, ProductFilter, ProductSearch, Specification,
};

fn age_builder() -> QueryBuilder {
    let mut qb = QueryBuilder::default();
    qb.from_table("t")
        .select(["id", "name"])
        .and_where("age > %s", params![18])
        .order_by("name ASC", vec![]);
    qb
}

#[test]
fn test_full_select() {
    let mut qb = age_builder();
    qb.limit(10).offset(5);

    let (sql, params) = qb.build();
    assert_eq!(
        sql,
        "SELECT id, name FROM t WHERE age > %s ORDER BY name ASC LIMIT %s OFFSET %s"
    );
    assert_eq!(params, params![18, 10i64, 5i64]);
}

#[test]
fn test_count_uses_where_params_only() {
    let qb = age_builder();
    let (sql, params) = qb.build_count();
    assert_eq!(sql, "SELECT COUNT(*) FROM t WHERE age > %s");
    assert_eq!(params, params![18]);
}

#[test]
fn test_count_ignores_limit_and_offset() {
    let mut qb = age_builder();
    let before = qb.build_count();
    qb.limit(10).offset(5);
    assert_eq!(qb.build_count(), before);
}

#[test]
fn test_reset_keeps_only_table() {
    let mut qb = age_builder();
    qb.join("JOIN u ON u.id = t.u_id").limit(3);
    qb.reset();

    let (sql, params) = qb.build();
    assert_eq!(sql, "SELECT * FROM t");
    assert!(params.is_empty());
}

#[test]
fn test_multiple_conditions_joined_with_and() {
    let mut qb = QueryBuilder::new("t");
    qb.and_where("a = %s", params![1])
        .and_where("", vec![])
        .and_where("b IN (%s, %s)", params!["x", "y"]);

    let (sql, params) = qb.build();
    assert_eq!(sql, "SELECT * FROM t WHERE a = %s AND b IN (%s, %s)");
    assert_eq!(params.len(), 3);
}

#[test]
fn test_blank_join_ignored() {
    let mut qb = QueryBuilder::new("t");
    qb.join("   ").join("LEFT JOIN u ON u.t_id = t.id");
    assert_eq!(qb.build().0, "SELECT * FROM t LEFT JOIN u ON u.t_id = t.id");
}

#[test]
fn test_pagination_offsets() {
    let p = Pagination::new(3, 10);
    assert_eq!(p.offset(), 20);
    assert_eq!(p.limit(), 10);
    assert_eq!(p.to_sql(), ("OFFSET %s LIMIT %s".to_string(), params![20i64, 10i64]));

    assert_eq!(Pagination::new(0, 10).offset(), 0);
    assert_eq!(p.total_pages(21), 3);
    assert_eq!(p.total_pages(0), 0);
}

#[test]
fn test_empty_filter() {
    let filter = ProductFilter::new();
    assert!(filter.is_empty());
    assert_eq!(filter.to_sql(), (String::new(), Vec::<QueryParam>::new()));
}

#[test]
fn test_filter_rendering() {
    let mut filter = ProductFilter::new();
    filter.set_year_range(Some(2010), Some(2015));
    filter.set_genders_csv("women, MEN");

    let (sql, params) = filter.to_sql();
    assert_eq!(
        sql,
        "WHERE year >= %s AND year <= %s AND gender IN (%s, %s)"
    );
    assert_eq!(params, params![2010, 2015, "Men", "Women"]);
}

#[test]
fn test_add_filter_by_name() {
    let mut filter = ProductFilter::new();
    filter.add_filter("min_year", "2012").unwrap();
    filter.add_filter("gender", "boys").unwrap();
    filter.add_filter("colour", "blue").unwrap();

    assert_eq!(filter.min_year(), Some(2012));
    assert_eq!(filter.genders().collect::<Vec<_>>(), vec!["Boys"]);
    assert!(filter.add_filter("max_year", "soon").is_err());
}

#[test]
fn test_ordering_defaults_and_allow_list() {
    assert_eq!(Ordering::new(None).to_sql().0, "ORDER BY id DESC");
    assert_eq!(Ordering::new(Some("price")).ordering_fields(), ["-id"]);
    assert_eq!(
        Ordering::for_products(Some("-year,id")).to_sql().0,
        "ORDER BY year DESC, product_id ASC"
    );
}

#[test]
fn test_search_split_across_accumulators() {
    let search = ProductSearch::new(Some("  red shirt "));
    let mut qb = QueryBuilder::new("catalog_products");
    search.apply_to(&mut qb);
    Pagination::new(1, 5).apply_to(&mut qb);

    let (sql, params) = qb.build();
    assert!(sql.contains(" WHERE to_tsvector("));
    assert!(sql.contains(" ORDER BY ts_rank("));
    assert!(sql.ends_with("LIMIT %s OFFSET %s"));
    assert_eq!(params, params!["red shirt", "red shirt", 5i64, 0i64]);

    assert!(ProductSearch::new(Some("   ")).is_empty());
    assert_eq!(ProductSearch::new(None).to_sql().0, "");
}

#[test]
fn test_specifications_compose_into_one_builder() {
    let mut filter = ProductFilter::new();
    filter.set_genders(["men"]);
    let category = Category::new(1, Some(10), None);

    let mut qb = QueryBuilder::new("catalog_products");
    qb.select(["product_id"]);
    category.apply_to(&mut qb);
    filter.apply_to(&mut qb);
    Ordering::for_products(None).apply_to(&mut qb);

    let (count_sql, count_params) = qb.build_count();
    assert!(count_sql.starts_with("SELECT COUNT(*) FROM catalog_products JOIN catalog_article_type at"));
    assert!(count_sql.ends_with(
        "WHERE mc.master_category_id = %s AND sc.sub_category_id = %s AND gender IN (%s)"
    ));
    assert_eq!(count_params, params![1i64, 10i64, "Men"]);

    Pagination::new(2, 20).apply_to(&mut qb);
    let (sql, params) = qb.build();
    assert!(sql.ends_with("ORDER BY product_id DESC LIMIT %s OFFSET %s"));
    assert_eq!(params, params![1i64, 10i64, "Men", 20i64, 20i64]);
}
