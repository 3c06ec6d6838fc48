//! Illustrative schemas bundled into the binary.

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub sql: &'static str,
}

pub const TEMPLATES: [Template; 3] = [
    Template {
        name: "ecommerce",
        description: "Customers, products, orders, order items and reviews",
        sql: include_str!("../schemas/ecommerce_schema.sql"),
    },
    Template {
        name: "blog",
        description: "Users, posts, categories, tags and threaded comments",
        sql: include_str!("../schemas/blog_schema.sql"),
    },
    Template {
        name: "school",
        description: "Departments, teachers, students, courses, enrollments and attendance",
        sql: include_str!("../schemas/school_schema.sql"),
    },
];

/// Look up a bundled schema by name, ignoring case.
pub fn find(name: &str) -> Result<&'static Template> {
    TEMPLATES
        .iter()
        .find(|template| template.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::UnknownTemplate(name.to_string()))
}
