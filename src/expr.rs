//! The boolean-expression grammar adapter.
//!
//! Built with `nom` parser combinators as an ordinary recursive descent
//! precedence climb: `equiv` < `implies` < `xor` < `or` < `and` < `not`
//! < atom, with `ite(f, g, h)` and the `\A`/`\E`/`forall`/`exists` binder
//! forms handled at the atom level.
//!
//! The parser builds an [`Expr`] AST first and defers all manager
//! interaction to [`Expr::eval`]; this keeps parsing infallible with
//! respect to the manager (a malformed *variable reference* is only
//! detected once the AST is evaluated against a concrete [`Manager`]).

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{alpha1, alphanumeric1, char, multispace0};
use nom::combinator::{cut, map, recognize, value};
use nom::multi::{many0, many0_count, separated_list1};
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;

use crate::error::{Error, Result};
use crate::handle::Bdd;
use crate::manager::Manager;

/// The parsed abstract syntax tree an [`crate::Manager::add_expr`] call
/// evaluates via `ite`/`apply`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    True,
    False,
    Var(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Equiv(Box<Expr>, Box<Expr>),
    Ite(Box<Expr>, Box<Expr>, Box<Expr>),
    Forall(Vec<String>, Box<Expr>),
    Exists(Vec<String>, Box<Expr>),
}

impl Expr {
    /// Evaluate this AST against `manager`, looking up every free
    /// variable by name (`Error::UnknownVariable` if it was never
    /// declared).
    pub fn eval(&self, manager: &Manager) -> Result<Bdd> {
        match self {
            Expr::True => Ok(manager.truthy()),
            Expr::False => Ok(manager.falsy()),
            Expr::Var(name) => {
                let v = manager.var_by_name(name)?;
                manager.var(v)
            }
            Expr::Not(e) => e.eval(manager)?.not(),
            Expr::And(a, b) => a.eval(manager)?.and(&b.eval(manager)?),
            Expr::Or(a, b) => a.eval(manager)?.or(&b.eval(manager)?),
            Expr::Xor(a, b) => a.eval(manager)?.xor(&b.eval(manager)?),
            Expr::Implies(a, b) => a.eval(manager)?.implies(&b.eval(manager)?),
            Expr::Equiv(a, b) => a.eval(manager)?.equiv(&b.eval(manager)?),
            Expr::Ite(f, g, h) => f.eval(manager)?.ite(&g.eval(manager)?, &h.eval(manager)?),
            Expr::Forall(vars, e) => {
                let ids = vars
                    .iter()
                    .map(|n| manager.var_by_name(n))
                    .collect::<Result<Vec<_>>>()?;
                e.eval(manager)?.forall(&ids)
            }
            Expr::Exists(vars, e) => {
                let ids = vars
                    .iter()
                    .map(|n| manager.var_by_name(n))
                    .collect::<Result<Vec<_>>>()?;
                e.eval(manager)?.exists(&ids)
            }
        }
    }
}

/// Parse `input` as a Boolean expression. Does not touch any manager;
/// call [`Expr::eval`] on the result.
pub fn parse(input: &str) -> Result<Expr> {
    let (rest, expr) = ws(parse_equiv)(input).map_err(|e| Error::Parse {
        reason: format!("{e}"),
    })?;
    if !rest.trim().is_empty() {
        return Err(Error::Parse {
            reason: format!("unexpected trailing input: `{}`", rest.trim()),
        });
    }
    Ok(expr)
}

fn ws<'a, F, O>(mut inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    move |input: &str| {
        let (input, _) = multispace0(input)?;
        let (input, out) = inner(input)?;
        let (input, _) = multispace0(input)?;
        Ok((input, out))
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// `<=>` / `<->` / `equiv`, left-associative, lowest precedence.
fn parse_equiv(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_implies(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("<=>"), tag("<->"), tag("equiv")))),
        cut(parse_implies),
    ))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, rhs| Expr::Equiv(Box::new(acc), Box::new(rhs))),
    ))
}

/// `=>` / `->` / `implies`.
fn parse_implies(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_xor(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("=>"), tag("->"), tag("implies")))),
        cut(parse_xor),
    ))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, rhs| Expr::Implies(Box::new(acc), Box::new(rhs))),
    ))
}

/// `^` / `#` / `xor`.
fn parse_xor(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_or(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("^"), tag("#"), tag("xor")))),
        cut(parse_or),
    ))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, rhs| Expr::Xor(Box::new(acc), Box::new(rhs))),
    ))
}

/// `|` / `||` / `\/` / `or`.
fn parse_or(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_and(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("||"), tag("|"), tag("\\/"), tag("or")))),
        cut(parse_and),
    ))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, rhs| Expr::Or(Box::new(acc), Box::new(rhs))),
    ))
}

/// `&` / `&&` / `/\` / `and`.
fn parse_and(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_not(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("&&"), tag("&"), tag("/\\"), tag("and")))),
        cut(parse_not),
    ))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, rhs| Expr::And(Box::new(acc), Box::new(rhs))),
    ))
}

/// `~` / `!` / `not`, right-associative (unary, so just recurses).
fn parse_not(input: &str) -> IResult<&str, Expr> {
    alt((
        map(
            preceded(ws(alt((tag("~"), tag("!"), tag("not")))), cut(parse_not)),
            |e| Expr::Not(Box::new(e)),
        ),
        parse_atom,
    ))(input)
}

fn parse_atom(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        parse_ite,
        parse_forall,
        parse_exists,
        parse_paren,
        parse_true,
        parse_false,
        parse_var,
    )))(input)
}

fn parse_true(input: &str) -> IResult<&str, Expr> {
    value(Expr::True, alt((tag("true"), tag("TRUE"), tag("1"))))(input)
}

fn parse_false(input: &str) -> IResult<&str, Expr> {
    value(Expr::False, alt((tag("false"), tag("FALSE"), tag("0"))))(input)
}

fn parse_var(input: &str) -> IResult<&str, Expr> {
    map(identifier, |s: &str| Expr::Var(s.to_string()))(input)
}

fn parse_paren(input: &str) -> IResult<&str, Expr> {
    delimited(ws(char('(')), parse_equiv, ws(char(')')))(input)
}

/// `ite(f, g, h)`.
fn parse_ite(input: &str) -> IResult<&str, Expr> {
    let (input, _) = tag("ite")(input)?;
    let (input, (f, g, h)) = cut(delimited(
        ws(char('(')),
        tuple((
            parse_equiv,
            preceded(ws(char(',')), parse_equiv),
            preceded(ws(char(',')), parse_equiv),
        )),
        ws(char(')')),
    ))(input)?;
    Ok((input, Expr::Ite(Box::new(f), Box::new(g), Box::new(h))))
}

fn var_list(input: &str) -> IResult<&str, Vec<String>> {
    map(
        separated_list1(ws(char(',')), identifier),
        |names: Vec<&str>| names.into_iter().map(str::to_string).collect(),
    )(input)
}

/// `\A vars: expr` or `forall(vars, expr)`.
fn parse_forall(input: &str) -> IResult<&str, Expr> {
    alt((
        map(
            preceded(
                ws(tag("\\A")),
                cut(tuple((var_list, preceded(ws(char(':')), parse_equiv)))),
            ),
            |(vars, body)| Expr::Forall(vars, Box::new(body)),
        ),
        map(
            preceded(
                tag("forall"),
                cut(delimited(
                    ws(char('(')),
                    tuple((var_list, preceded(ws(char(',')), parse_equiv))),
                    ws(char(')')),
                )),
            ),
            |(vars, body)| Expr::Forall(vars, Box::new(body)),
        ),
    ))(input)
}

/// `\E vars: expr` or `exists(vars, expr)`.
fn parse_exists(input: &str) -> IResult<&str, Expr> {
    alt((
        map(
            preceded(
                ws(tag("\\E")),
                cut(tuple((var_list, preceded(ws(char(':')), parse_equiv)))),
            ),
            |(vars, body)| Expr::Exists(vars, Box::new(body)),
        ),
        map(
            preceded(
                tag("exists"),
                cut(delimited(
                    ws(char('(')),
                    tuple((var_list, preceded(ws(char(',')), parse_equiv))),
                    ws(char(')')),
                )),
            ),
            |(vars, body)| Expr::Exists(vars, Box::new(body)),
        ),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::Manager;

    #[test]
    fn parses_ascii_and_tla_synonyms_identically() {
        assert_eq!(parse("x & y").unwrap(), parse("x and y").unwrap());
        assert_eq!(parse("x & y").unwrap(), parse("x /\\ y").unwrap());
        assert_eq!(parse("x | y").unwrap(), parse("x \\/ y").unwrap());
        assert_eq!(parse("~x").unwrap(), parse("not x").unwrap());
        assert_eq!(parse("x => y").unwrap(), parse("x implies y").unwrap());
        assert_eq!(parse("x <=> y").unwrap(), parse("x equiv y").unwrap());
    }

    #[test]
    fn precedence_matches_propositional_convention() {
        // `~x & y` should be `(~x) & y`, not `~(x & y)`.
        let e = parse("~x & y").unwrap();
        assert_eq!(
            e,
            Expr::And(
                Box::new(Expr::Not(Box::new(Expr::Var("x".into())))),
                Box::new(Expr::Var("y".into()))
            )
        );
    }

    #[test]
    fn parens_override_precedence() {
        let e = parse("~(x & y)").unwrap();
        assert_eq!(
            e,
            Expr::Not(Box::new(Expr::And(
                Box::new(Expr::Var("x".into())),
                Box::new(Expr::Var("y".into()))
            )))
        );
    }

    #[test]
    fn ite_and_quantifiers_parse() {
        assert!(parse("ite(x, y, z)").is_ok());
        assert!(parse("exists(x, y, x & y)").is_ok());
        assert!(parse("\\A x, y : x => y").is_ok());
        assert!(parse("forall(x, x | ~x)").is_ok());
    }

    #[test]
    fn evaluates_against_a_manager() {
        let m = Manager::new();
        m.declare(&["x", "y"]).unwrap();
        let ast = parse("x & y").unwrap();
        let bdd = ast.eval(&m).unwrap();
        let vx = m.var(m.var_by_name("x").unwrap()).unwrap();
        let vy = m.var(m.var_by_name("y").unwrap()).unwrap();
        let expect = m.and(&vx, &vy).unwrap();
        assert_eq!(bdd, expect);
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let m = Manager::new();
        m.declare(&["x"]).unwrap();
        let ast = parse("x & y").unwrap();
        assert!(ast.eval(&m).is_err());
    }
}
