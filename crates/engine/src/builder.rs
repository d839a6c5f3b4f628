//! AST → pipeline compiler.
//!
//! Compiles a normalized query into a connected operator graph rooted at
//! shared sources. The WHERE tree becomes filter chains — AND as
//! sequential filters, OR as duplicated stateless branches merged by
//! Concat and deduplicated by Distinct — followed by GroupBy or
//! FullAggregate when the query aggregates. Projection, final ordering,
//! and limit stay with the consuming view.
//!
//! `Related` specs compile hierarchical queries: each spec joins a child
//! pipeline under a named relationship of the parent, nesting
//! recursively.

use crate::resolver::SourceResolver;
use alloc::string::String;
use alloc::vec::Vec;
use rill_core::{Error, LikePattern, Result, Value};
use rill_incremental::{
    AggregateFn, Aggregation, ColumnRef, CompareOp, CompiledPredicate, Concat, Distinct, Filter,
    FullAggregate, GroupBy, Join, OperatorNode, Pipeline, Scan,
};
use rill_query::{Aggregate, AggregateOp, Ast, Condition, ConjunctionOp, SimpleOp};

/// A hierarchical sub-query joined under `relationship_name` of its
/// parent: child rows whose `child_key` equals the parent's `parent_key`.
#[derive(Clone, Debug)]
pub struct Related {
    pub relationship_name: String,
    pub parent_key: String,
    pub child_key: String,
    pub child: Ast,
    pub related: Vec<Related>,
}

impl Related {
    pub fn new(
        relationship_name: impl Into<String>,
        parent_key: impl Into<String>,
        child_key: impl Into<String>,
        child: Ast,
    ) -> Self {
        Self {
            relationship_name: relationship_name.into(),
            parent_key: parent_key.into(),
            child_key: child_key.into(),
            child,
            related: Vec::new(),
        }
    }

    pub fn with_related(mut self, related: Related) -> Self {
        self.related.push(related);
        self
    }
}

/// Compiles a flat query.
pub fn build_pipeline(ast: &Ast, resolver: &dyn SourceResolver) -> Result<Pipeline> {
    Ok(Pipeline::new(build_root(ast, &[], resolver)?))
}

/// Compiles a query plus its related sub-queries.
pub fn build_related_pipeline(
    ast: &Ast,
    related: &[Related],
    resolver: &dyn SourceResolver,
) -> Result<Pipeline> {
    Ok(Pipeline::new(build_root(ast, related, resolver)?))
}

fn build_root(ast: &Ast, related: &[Related], resolver: &dyn SourceResolver) -> Result<OperatorNode> {
    let source = resolver
        .resolve(&ast.table)
        .ok_or_else(|| Error::unknown_table(ast.table.clone()))?;
    validate_columns(ast, &source)?;

    let mut node = OperatorNode::Scan(Scan::new(&source));
    if let Some(condition) = &ast.where_clause {
        node = compile_condition(condition, node, ast)?;
    }

    if !ast.group_by.is_empty() {
        node = OperatorNode::GroupBy(GroupBy::new(
            node,
            ast.group_by.clone(),
            convert_aggregations(&ast.aggregates),
        )?);
    } else if !ast.aggregates.is_empty() {
        node = OperatorNode::FullAggregate(FullAggregate::new(
            node,
            convert_aggregations(&ast.aggregates),
        )?);
    }

    for spec in related {
        let child = build_root(&spec.child, &spec.related, resolver)?;
        if !node.schema().has_column(&spec.parent_key) {
            return Err(Error::unknown_column(
                node.schema().name(),
                spec.parent_key.clone(),
            ));
        }
        if !child.schema().has_column(&spec.child_key) {
            return Err(Error::unknown_column(
                child.schema().name(),
                spec.child_key.clone(),
            ));
        }
        // Joins constrain both directions, so both sides get an equality
        // index on their key when the key is a stored column.
        source.borrow_mut().ensure_index(&spec.parent_key).ok();
        if let Some(child_source) = resolver.resolve(&spec.child.table) {
            child_source.borrow_mut().ensure_index(&spec.child_key).ok();
        }
        node = OperatorNode::Join(Join::new(
            node,
            child.shared(),
            spec.parent_key.clone(),
            spec.child_key.clone(),
            spec.relationship_name.clone(),
        )?);
    }

    Ok(node)
}

fn validate_columns(ast: &Ast, source: &rill_incremental::SourceHandle) -> Result<()> {
    let source = source.borrow();
    let schema = source.schema();
    let check = |column: &str| -> Result<()> {
        if schema.has_column(column) {
            Ok(())
        } else {
            Err(Error::unknown_column(schema.name(), column))
        }
    };

    for (selector, _) in &ast.select {
        check(selector)?;
    }
    for (column, _) in &ast.order_by {
        check(column)?;
    }
    for column in &ast.group_by {
        check(column)?;
    }
    for aggregate in &ast.aggregates {
        if let Some(field) = &aggregate.field {
            check(field)?;
        }
    }
    if let Some(condition) = &ast.where_clause {
        validate_condition(condition, &check)?;
    }
    Ok(())
}

fn validate_condition(
    condition: &Condition,
    check: &dyn Fn(&str) -> Result<()>,
) -> Result<()> {
    match condition {
        Condition::Simple { field, .. } => check(field),
        Condition::Conjunction { conditions, .. } => {
            for child in conditions {
                validate_condition(child, check)?;
            }
            Ok(())
        }
    }
}

fn compile_condition(condition: &Condition, input: OperatorNode, ast: &Ast) -> Result<OperatorNode> {
    match condition {
        Condition::Simple { op, field, value } => {
            let predicate = compile_predicate(*op, field, value, ast)?;
            Ok(OperatorNode::Filter(Filter::new(input, predicate)))
        }
        Condition::Conjunction { op, conditions } => match op {
            // AND is sequential composition of sub-filters.
            ConjunctionOp::And => {
                let mut node = input;
                for child in conditions {
                    node = compile_condition(child, node, ast)?;
                }
                Ok(node)
            }
            // OR fans the (stateless) upstream into one branch per
            // sub-condition, concatenates, and dedups by primary key.
            ConjunctionOp::Or => {
                if conditions.is_empty() {
                    return Ok(input);
                }
                let mut branches = Vec::with_capacity(conditions.len());
                for child in conditions {
                    branches.push(compile_condition(
                        child,
                        input.duplicate_stateless()?,
                        ast,
                    )?);
                }
                let concat = OperatorNode::Concat(Concat::new(branches)?);
                Ok(OperatorNode::Distinct(Distinct::new(concat)))
            }
        },
    }
}

fn compile_predicate(
    op: SimpleOp,
    field: &str,
    value: &Value,
    ast: &Ast,
) -> Result<CompiledPredicate> {
    let column = match &ast.alias {
        Some(alias) => ColumnRef::qualified(alias.clone(), field),
        None => ColumnRef::new(field),
    };
    let compare = |op: CompareOp| CompiledPredicate::Compare {
        column: column.clone(),
        op,
        value: value.clone(),
    };
    Ok(match op {
        SimpleOp::Eq => compare(CompareOp::Eq),
        SimpleOp::Ne => compare(CompareOp::Ne),
        SimpleOp::Lt => compare(CompareOp::Lt),
        SimpleOp::Le => compare(CompareOp::Le),
        SimpleOp::Gt => compare(CompareOp::Gt),
        SimpleOp::Ge => compare(CompareOp::Ge),
        SimpleOp::In | SimpleOp::NotIn => {
            let values = match value {
                Value::Array(values) => values.clone(),
                _ => {
                    return Err(Error::invalid_query(
                        "IN requires a literal list on the right-hand side",
                    ))
                }
            };
            CompiledPredicate::InList {
                column,
                values,
                negated: op == SimpleOp::NotIn,
            }
        }
        SimpleOp::Like | SimpleOp::NotLike | SimpleOp::ILike | SimpleOp::NotILike => {
            let pattern = match value {
                Value::Text(pattern) => pattern,
                _ => {
                    return Err(Error::invalid_query(
                        "LIKE requires a string pattern on the right-hand side",
                    ))
                }
            };
            let case_insensitive =
                matches!(op, SimpleOp::ILike | SimpleOp::NotILike);
            CompiledPredicate::Like {
                column,
                pattern: LikePattern::compile(pattern, case_insensitive)?,
                negated: matches!(op, SimpleOp::NotLike | SimpleOp::NotILike),
            }
        }
    })
}

fn convert_aggregations(aggregates: &[Aggregate]) -> Vec<Aggregation> {
    aggregates
        .iter()
        .map(|aggregate| {
            Aggregation::new(
                convert_aggregate_op(aggregate.aggregate),
                aggregate.field.clone(),
                aggregate.alias.clone(),
            )
        })
        .collect()
}

fn convert_aggregate_op(op: AggregateOp) -> AggregateFn {
    match op {
        AggregateOp::Count => AggregateFn::Count,
        AggregateOp::Sum => AggregateFn::Sum,
        AggregateOp::Avg => AggregateFn::Avg,
        AggregateOp::Min => AggregateFn::Min,
        AggregateOp::Max => AggregateFn::Max,
        AggregateOp::Array => AggregateFn::Array,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SourceMap;
    use alloc::vec;
    use rill_core::{text_pk_schema, DataType};
    use rill_incremental::Source;
    use rill_query::{normalize, Direction};

    fn resolver() -> SourceMap {
        let mut map = SourceMap::new();
        map.insert(Source::handle(
            text_pk_schema(
                "issue",
                &[
                    ("id", DataType::Text),
                    ("owner", DataType::Text),
                    ("points", DataType::Int),
                ],
                &["id"],
            )
            .unwrap(),
        ));
        map.insert(Source::handle(
            text_pk_schema(
                "comment",
                &[("id", DataType::Text), ("issue_id", DataType::Text)],
                &["id"],
            )
            .unwrap(),
        ));
        map
    }

    fn ordered(ast: Ast) -> Ast {
        normalize(ast.with_order_by("id", Direction::Asc))
    }

    #[test]
    fn unknown_table_is_rejected() {
        let ast = ordered(Ast::table("missing"));
        let err = build_pipeline(&ast, &resolver()).unwrap_err();
        assert!(matches!(err, Error::UnknownTable { .. }));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let ast = ordered(
            Ast::table("issue").with_where(Condition::eq("priority", Value::Int(1))),
        );
        let err = build_pipeline(&ast, &resolver()).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }

    #[test]
    fn or_compiles_to_concat_distinct() {
        let ast = ordered(Ast::table("issue").with_where(Condition::or(vec![
            Condition::eq("owner", Value::Text("u1".into())),
            Condition::eq("points", Value::Int(1)),
        ])));
        let pipeline = build_pipeline(&ast, &resolver()).unwrap();
        assert!(matches!(pipeline.root(), OperatorNode::Distinct(_)));
    }

    #[test]
    fn group_by_compiles_to_group_operator() {
        let ast = ordered(
            Ast::table("issue")
                .with_group_by(["owner"])
                .with_aggregate(AggregateOp::Count, None, "count"),
        );
        let pipeline = build_pipeline(&ast, &resolver()).unwrap();
        assert!(matches!(pipeline.root(), OperatorNode::GroupBy(_)));
    }

    #[test]
    fn full_aggregate_rejects_order_dependent_kinds() {
        let ast = ordered(
            Ast::table("issue").with_aggregate(AggregateOp::Min, Some("points"), "least"),
        );
        let err = build_pipeline(&ast, &resolver()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedAggregate { .. }));

        let ok = ordered(
            Ast::table("issue").with_aggregate(AggregateOp::Sum, Some("points"), "total"),
        );
        assert!(build_pipeline(&ok, &resolver()).is_ok());
    }

    #[test]
    fn dangling_escape_fails_at_build() {
        let ast = ordered(Ast::table("issue").with_where(Condition::simple(
            "owner",
            SimpleOp::Like,
            Value::Text("abc\\".into()),
        )));
        let err = build_pipeline(&ast, &resolver()).unwrap_err();
        assert!(matches!(err, Error::DanglingEscape { .. }));
    }

    #[test]
    fn in_requires_a_list() {
        let ast = ordered(Ast::table("issue").with_where(Condition::simple(
            "points",
            SimpleOp::In,
            Value::Int(3),
        )));
        let err = build_pipeline(&ast, &resolver()).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery { .. }));
    }

    #[test]
    fn related_builds_a_join_with_relationship_schema() {
        let ast = ordered(Ast::table("issue"));
        let related = vec![Related::new(
            "comments",
            "id",
            "issue_id",
            ordered(Ast::table("comment")),
        )];
        let pipeline = build_related_pipeline(&ast, &related, &resolver()).unwrap();
        assert!(matches!(pipeline.root(), OperatorNode::Join(_)));
        let schema = pipeline.schema();
        assert_eq!(schema.relationships().len(), 1);
        assert_eq!(schema.relationships()[0].0, "comments");
    }

    #[test]
    fn related_with_unknown_key_is_rejected() {
        let ast = ordered(Ast::table("issue"));
        let related = vec![Related::new(
            "comments",
            "uuid",
            "issue_id",
            ordered(Ast::table("comment")),
        )];
        let err = build_related_pipeline(&ast, &related, &resolver()).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }
}
