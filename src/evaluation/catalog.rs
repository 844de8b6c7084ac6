//! The fixed benchmark queries and the shape of their answers.

use serde::Serialize;

use crate::errors::{EvaluationError, EvaluationResult};

/// How a query's answer is scored.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryKind {
    /// A set of identifiers, scored with precision and recall. A `limit`
    /// means the engine may legitimately return any subset of that size.
    Retrieval {
        id_column: &'static str,
        limit: Option<usize>,
    },
    /// One number, scored by relative error.
    Aggregation { column: &'static str },
    /// A label per car, scored with macro-averaged precision and recall.
    Labeling {
        id_column: &'static str,
        label_column: &'static str,
    },
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub id: u32,
    pub description: &'static str,
    pub kind: QueryKind,
}

impl Query {
    pub fn name(&self) -> String {
        format!("Q{}", self.id)
    }
}

const fn retrieval(id: u32, description: &'static str, id_column: &'static str) -> Query {
    Query {
        id,
        description,
        kind: QueryKind::Retrieval {
            id_column,
            limit: None,
        },
    }
}

pub const CATALOG: &[Query] = &[
    retrieval(1, "Cars with a complaint that reports a crash", "car_id"),
    retrieval(
        2,
        "Electric cars whose startup recording reveals a dead battery",
        "car_id",
    ),
    Query {
        id: 3,
        description: "Manual cars without visible damage (LIMIT 10)",
        kind: QueryKind::Retrieval {
            id_column: "vin",
            limit: Some(10),
        },
    },
    Query {
        id: 4,
        description: "Average age of cars with an engine complaint",
        kind: QueryKind::Aggregation {
            column: "average_age",
        },
    },
    Query {
        id: 5,
        description: "Number of automatic cars damaged by both image and audio",
        kind: QueryKind::Aggregation { column: "count" },
    },
    retrieval(
        6,
        "Cars whose modalities disagree on whether the car is damaged",
        "car_id",
    ),
    retrieval(
        7,
        "Cars that are dented, have worn-out brakes or an electrical complaint",
        "car_id",
    ),
    Query {
        id: 8,
        description: "Cars with paint scratches and a puncture (LIMIT 100)",
        kind: QueryKind::Retrieval {
            id_column: "car_id",
            limit: Some(100),
        },
    },
    retrieval(9, "Torn cars with a bad ignition recording", "car_id"),
    Query {
        id: 10,
        description: "Problem category of each car's complaint",
        kind: QueryKind::Labeling {
            id_column: "car_id",
            label_column: "problem_category",
        },
    },
];

pub fn query(id: u32) -> EvaluationResult<&'static Query> {
    CATALOG
        .iter()
        .find(|q| q.id == id)
        .ok_or(EvaluationError::UnknownQuery(id))
}
