use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    // May contain `{name}` placeholders, resolved against constants at evaluation time.
    String(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
}

impl Literal {
    pub fn render(&self) -> String {
        match self {
            Self::String(value) => value.clone(),
            Self::Number(value) => render_number(*value),
            Self::Integer(value) => value.to_string(),
            Self::Boolean(value) => value.to_string(),
        }
    }
}

pub fn render_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierRef {
    pub name: String,
    pub args: Option<Vec<Node>>,
    pub negative: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresetDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    ConstDecl {
        name: String,
        value: Box<Node>,
    },
    PresetDecl(Rc<PresetDecl>),
    PresetUse {
        name: String,
        args: Vec<Node>,
    },
    RemoveElement {
        selector: Box<Node>,
    },
    RemoveAllElements {
        selector: Box<Node>,
    },
    RemoveAttribute {
        name: Box<Node>,
    },
    SetAttribute {
        name: Box<Node>,
        value: Box<Node>,
    },
    Include {
        name: String,
    },
    FileBlock {
        path: Box<Node>,
        body: Vec<Node>,
    },
    AddElement {
        tag: Box<Node>,
        position: Option<Box<Node>>,
        body: Vec<Node>,
    },
    ChangeElement {
        selector: Box<Node>,
        body: Vec<Node>,
    },
    ChangeAllElements {
        selector: Box<Node>,
        body: Vec<Node>,
    },
    ChangeOrAddElement {
        tag: Box<Node>,
        position: Option<Box<Node>>,
        body: Vec<Node>,
    },
    Literal(Literal),
    IdentifierRef(IdentifierRef),
    Block(Vec<Node>),
}

impl Node {
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal::String(value.into()))
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::IdentifierRef(IdentifierRef {
            name: name.into(),
            args: None,
            negative: false,
        })
    }
}

#[cfg(test)]
mod ast_tests {
    use super::*;

    #[test]
    fn literals_render_as_text() {
        assert_eq!(Literal::String("a".to_string()).render(), "a");
        assert_eq!(Literal::Number(1.5).render(), "1.5");
        assert_eq!(Literal::Number(7.0).render(), "7");
        assert_eq!(Literal::Number(-0.25).render(), "-0.25");
        assert_eq!(Literal::Integer(-3).render(), "-3");
        assert_eq!(Literal::Boolean(false).render(), "false");
    }

    #[test]
    fn render_number_names_non_finite_values() {
        assert_eq!(render_number(f64::NAN), "NaN");
        assert_eq!(render_number(f64::INFINITY), "Infinity");
        assert_eq!(render_number(f64::NEG_INFINITY), "-Infinity");
    }
}
