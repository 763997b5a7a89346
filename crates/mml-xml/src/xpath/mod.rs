mod eval;
mod syntax;

use mml_core::MmlError;

use crate::tree::{NodeId, XmlDocument};
use eval::{Evaluator, Value, XNode};

fn evaluate<'d>(
    document: &'d XmlDocument,
    context: NodeId,
    expression: &str,
) -> Result<(Evaluator<'d>, Value), MmlError> {
    let expr = syntax::parse_expression(expression)?;
    let evaluator = Evaluator::new(document, context);
    let value = evaluator.evaluate(&expr, context)?;
    Ok((evaluator, value))
}

pub fn select_elements(
    document: &XmlDocument,
    context: NodeId,
    expression: &str,
) -> Result<Vec<NodeId>, MmlError> {
    let (_, value) = evaluate(document, context, expression)?;
    let Value::Nodes(nodes) = value else {
        return Err(MmlError::new(
            "XPATH_NOT_NODESET",
            format!("Expression \"{}\" does not select elements", expression),
        ));
    };
    Ok(nodes
        .into_iter()
        .filter_map(|node| match node {
            XNode::Node(id) if document.is_element(id) => Some(id),
            _ => None,
        })
        .collect())
}

pub fn select_first_element(
    document: &XmlDocument,
    context: NodeId,
    expression: &str,
) -> Result<Option<NodeId>, MmlError> {
    Ok(select_elements(document, context, expression)?.into_iter().next())
}

// Same as wrapping the expression in `string(...)`.
pub fn evaluate_string(
    document: &XmlDocument,
    context: NodeId,
    expression: &str,
) -> Result<String, MmlError> {
    let (evaluator, value) = evaluate(document, context, expression)?;
    Ok(evaluator.to_string(&value))
}

#[cfg(test)]
mod xpath_tests {
    use super::*;
    use crate::xml::parse_xml_document;

    fn truck() -> XmlDocument {
        parse_xml_document(
            r#"<root><Truck name="t1" speed="10"><Wheels><Wheel size="1"/><Wheel size="2"/><Spare/><Wheel size="3"/></Wheels><Cargo>  sand   and stone </Cargo></Truck><Truck name="t2" speed="4"/></root>"#,
        )
        .expect("xml should parse")
    }

    fn names(document: &XmlDocument, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|id| {
                let name = document.name(*id).unwrap_or_default();
                match document.attribute(*id, "name").or(document.attribute(*id, "size")) {
                    Some(label) => format!("{}:{}", name, label),
                    None => name.to_string(),
                }
            })
            .collect()
    }

    #[test]
    fn child_paths_and_positions_count_same_name_siblings() {
        let document = truck();
        let truck = select_first_element(&document, document.root_element(), "Truck")
            .expect("select")
            .expect("truck exists");
        let wheels = select_elements(&document, truck, "Wheels/Wheel").expect("select");
        assert_eq!(names(&document, &wheels), vec!["Wheel:1", "Wheel:2", "Wheel:3"]);
        let third = select_elements(&document, truck, "Wheels/Wheel[3]").expect("select");
        assert_eq!(names(&document, &third), vec!["Wheel:3"]);
        let last = select_elements(&document, truck, "Wheels/*[last()]").expect("select");
        assert_eq!(names(&document, &last), vec!["Wheel:3"]);
        assert!(select_elements(&document, truck, "Wheels/Wheel[4]")
            .expect("select")
            .is_empty());
    }

    #[test]
    fn absolute_and_descendant_paths_start_at_document() {
        let document = truck();
        let wheel = select_first_element(&document, document.root_element(), "//Wheel[@size='2']")
            .expect("select")
            .expect("wheel exists");
        let trucks = select_elements(&document, wheel, "/root/Truck").expect("select");
        assert_eq!(names(&document, &trucks), vec!["Truck:t1", "Truck:t2"]);
        let owner = select_elements(&document, wheel, "ancestor::Truck").expect("select");
        assert_eq!(names(&document, &owner), vec!["Truck:t1"]);
        let parent = select_elements(&document, wheel, "..").expect("select");
        assert_eq!(names(&document, &parent), vec!["Wheels"]);
    }

    #[test]
    fn predicates_compare_attributes_and_numbers() {
        let document = truck();
        let root = document.root_element();
        let fast = select_elements(&document, root, "Truck[@speed > 5]").expect("select");
        assert_eq!(names(&document, &fast), vec!["Truck:t1"]);
        let named = select_elements(&document, root, "Truck[@name = 't2' or @speed = 10]")
            .expect("select");
        assert_eq!(names(&document, &named), vec!["Truck:t1", "Truck:t2"]);
        let without = select_elements(&document, root, "Truck[not(Wheels)]").expect("select");
        assert_eq!(names(&document, &without), vec!["Truck:t2"]);
        let siblings =
            select_elements(&document, root, "//Spare/following-sibling::* | //Spare/preceding-sibling::*[1]")
                .expect("select");
        assert_eq!(names(&document, &siblings), vec!["Wheel:2", "Wheel:3"]);
    }

    #[test]
    fn string_evaluation_reads_values() {
        let document = truck();
        let root = document.root_element();
        let truck = select_first_element(&document, root, "Truck")
            .expect("select")
            .expect("truck exists");
        assert_eq!(evaluate_string(&document, truck, "@name").expect("eval"), "t1");
        assert_eq!(evaluate_string(&document, truck, "@missing").expect("eval"), "");
        assert_eq!(evaluate_string(&document, truck, "count(Wheels/Wheel)").expect("eval"), "3");
        assert_eq!(
            evaluate_string(&document, truck, "normalize-space(Cargo)").expect("eval"),
            "sand and stone"
        );
        assert_eq!(
            evaluate_string(&document, truck, "concat(name(), '-', @speed + 1)").expect("eval"),
            "Truck-11"
        );
        assert_eq!(
            evaluate_string(&document, root, "contains(Truck[2]/@name, '2')").expect("eval"),
            "true"
        );
        assert_eq!(evaluate_string(&document, root, "number('x')").expect("eval"), "NaN");
        assert_eq!(evaluate_string(&document, root, "string-length('abc')").expect("eval"), "3");
    }

    #[test]
    fn detached_subtrees_are_searchable() {
        let mut document = truck();
        let truck = select_first_element(&document, document.root_element(), "Truck")
            .expect("select")
            .expect("truck exists");
        document.detach(truck);
        let wheels = select_elements(&document, truck, "Wheels/Wheel").expect("select");
        assert_eq!(wheels.len(), 3);
        assert!(select_elements(&document, document.root_element(), "Truck[@name='t1']")
            .expect("select")
            .is_empty());
    }

    #[test]
    fn errors_are_classified() {
        let document = truck();
        let root = document.root_element();
        let error = select_elements(&document, root, "count(Truck)").expect_err("number is not a node-set");
        assert_eq!(error.code, "XPATH_NOT_NODESET");
        let error = select_elements(&document, root, "Truck[").expect_err("unterminated predicate");
        assert_eq!(error.code, "XPATH_SYNTAX");
        let error = evaluate_string(&document, root, "frobnicate()").expect_err("unknown function");
        assert_eq!(error.code, "XPATH_SYNTAX");
        let error = evaluate_string(&document, root, "contains('a')").expect_err("wrong arity");
        assert_eq!(error.code, "XPATH_SYNTAX");
    }
}
