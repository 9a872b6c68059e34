//! Rendering of parsed programs, either back to source text or as an indented
//! node dump.

use std::fmt::{self, Write};

use crate::parser::{Assignment, Ast, Expression};

/// Renders `ast` as source text, one statement per line.
///
/// The output tokenizes and parses back to an equal tree for anything `parse`
/// produced.
pub fn to_source(ast: &Ast) -> String {
    let mut out = String::new();
    for statement in &ast.statements {
        out.push_str(&statement.target);
        out.push('=');
        write_expression(&mut out, &statement.value);
        out.push_str(";\n");
    }
    out
}

fn write_expression(out: &mut String, expression: &Expression) {
    match expression {
        Expression::Integer(value) => out.push_str(&value.to_string()),
        Expression::Variable(name) => out.push_str(name),
        Expression::Group(inner) => {
            out.push('(');
            write_expression(out, inner);
            out.push(')');
        }
        Expression::Binary { op, lhs, rhs } => {
            write_expression(out, lhs);
            out.push_str(op.symbol());
            write_expression(out, rhs);
        }
    }
}

fn write_indent(f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
    for _ in 0..level {
        f.write_char('\t')?;
    }
    Ok(())
}

fn fmt_assignment(
    f: &mut fmt::Formatter<'_>,
    assignment: &Assignment,
    level: usize,
) -> fmt::Result {
    write_indent(f, level)?;
    writeln!(f, "Assignment")?;
    write_indent(f, level + 1)?;
    writeln!(f, "Variable: {}", assignment.target)?;
    fmt_expression(f, &assignment.value, level + 1)
}

fn fmt_expression(f: &mut fmt::Formatter<'_>, expression: &Expression, level: usize) -> fmt::Result {
    write_indent(f, level)?;
    match expression {
        Expression::Integer(value) => writeln!(f, "{}: {value}", expression.kind()),
        Expression::Variable(name) => writeln!(f, "{}: {name}", expression.kind()),
        Expression::Group(inner) => {
            writeln!(f, "{}", expression.kind())?;
            fmt_expression(f, inner, level + 1)
        }
        Expression::Binary { lhs, rhs, .. } => {
            writeln!(f, "{}", expression.kind())?;
            fmt_expression(f, lhs, level + 1)?;
            fmt_expression(f, rhs, level + 1)
        }
    }
}

/// Tree dump with one node per line, children indented by a tab.
impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "StatementList")?;
        for statement in &self.statements {
            fmt_assignment(f, statement, 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::to_source;
    use crate::parser::parse;
    use crate::tokenizer::tokenize;

    fn parse_source(source: &str) -> crate::parser::Ast {
        let tokens = tokenize(source).expect("tokenize source");
        parse(&tokens).expect("parse source")
    }

    #[test]
    fn dumps_tree_with_tab_indentation() {
        let ast = parse_source("a=(1+2)*b;");
        let expected = "StatementList\n\
                        \tAssignment\n\
                        \t\tVariable: a\n\
                        \t\t*\n\
                        \t\t\tExpression\n\
                        \t\t\t\t+\n\
                        \t\t\t\t\tInteger: 1\n\
                        \t\t\t\t\tInteger: 2\n\
                        \t\t\tVariable: b\n";
        assert_eq!(ast.to_string(), expected);
    }

    #[test]
    fn empty_program_dumps_only_the_root() {
        assert_eq!(parse_source("").to_string(), "StatementList\n");
    }

    #[test]
    fn prints_one_statement_per_line() {
        let ast = parse_source("a = 1 ;\n b = a + 2;");
        assert_eq!(to_source(&ast), "a=1;\nb=a+2;\n");
    }

    #[test]
    fn prints_integers_in_decimal() {
        let ast = parse_source("big=18446744073709551615;z=007;");
        assert_eq!(to_source(&ast), "big=18446744073709551615;\nz=7;\n");
    }

    #[test]
    fn prints_nested_groups() {
        let ast = parse_source("x=((1+2)*3)*4;");
        assert_eq!(to_source(&ast), "x=((1+2)*3)*4;\n");
    }

    #[test]
    fn keeps_every_group() {
        let ast = parse_source("x=1+(2+3);y=((z));");
        assert_eq!(to_source(&ast), "x=1+(2+3);\ny=((z));\n");
    }

    #[test]
    fn printed_source_parses_to_the_same_tree() {
        let sources = [
            "a=1;",
            "a=1+2+3;",
            "a=(1+2)*3;",
            "a=1+(2+3)*4;",
            "a=((a-b)/c)*d;e=f;",
            "total=(x)*y;",
            "a=(b);",
            "",
        ];
        for source in sources {
            let ast = parse_source(source);
            let reparsed = parse_source(&to_source(&ast));
            assert_eq!(reparsed, ast, "source {source:?}");
        }
    }
}
