//! A Turtle parser for the subset of the grammar this pipeline's fixtures
//! actually use: `@prefix` declarations, IRIREFs and prefixed names in
//! subject/predicate/object position, plain/typed/language-tagged string
//! literals, bare integer and decimal literals, the `a` shorthand for
//! `rdf:type`, `;`-chained predicate-object lists, `,`-chained object lists,
//! and `.`-terminated statements.
//!
//! This is deliberately not a general Turtle/TriG implementation: blank node
//! property lists (`[...]`), collections (`(...)`), and multi-line strings
//! are unsupported because every canonicalized graph in this system must be
//! blank-node-free, and fixtures never exercise the others. Anything outside
//! the subset is a [`GraphError::Parse`] -- fail-closed like every other
//! stage.

use std::collections::HashMap;

use adaptive_term::{Graph, Iri, Literal, Term, Triple};

use crate::error::GraphError;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

struct Parser {
    chars: Vec<char>,
    pos: usize,
    prefixes: HashMap<String, String>,
}

impl Parser {
    fn new(src: &str) -> Self {
        Parser { chars: src.chars().collect(), pos: 0, prefixes: HashMap::new() }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn err(&self, message: impl Into<String>) -> GraphError {
        GraphError::Parse(format!("{} (at offset {})", message.into(), self.pos))
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), GraphError> {
        match self.advance() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.err(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.err(format!("expected '{expected}', found end of input"))),
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws_and_comments();
        self.pos >= self.chars.len()
    }

    /// Reads an `IRIREF`: `<...>`, unescaping nothing further -- fixtures
    /// only ever use plain ASCII IRIs here.
    fn read_iriref(&mut self) -> Result<String, GraphError> {
        self.expect_char('<')?;
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('>') => break,
                Some(c) => value.push(c),
                None => return Err(self.err("unterminated IRIREF")),
            }
        }
        Ok(value)
    }

    fn is_pname_char(c: char) -> bool {
        c.is_alphanumeric() || c == '-' || c == '_' || c == '.'
    }

    /// Reads a prefixed name `prefix:local` (prefix may be empty) and
    /// resolves it against the declared `@prefix` table.
    fn read_pname(&mut self) -> Result<String, GraphError> {
        let mut prefix = String::new();
        while let Some(c) = self.peek() {
            if Self::is_pname_char(c) {
                prefix.push(c);
                self.advance();
            } else {
                break;
            }
        }
        self.expect_char(':')?;
        let mut local = String::new();
        while let Some(c) = self.peek() {
            if Self::is_pname_char(c) {
                local.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let namespace = self
            .prefixes
            .get(&prefix)
            .ok_or_else(|| self.err(format!("undeclared prefix '{prefix}'")))?;
        Ok(format!("{namespace}{local}"))
    }

    fn parse_prefix_decl(&mut self) -> Result<(), GraphError> {
        for expected in "@prefix".chars() {
            self.expect_char(expected)?;
        }
        self.skip_ws_and_comments();
        let mut prefix = String::new();
        while let Some(c) = self.peek() {
            if Self::is_pname_char(c) {
                prefix.push(c);
                self.advance();
            } else {
                break;
            }
        }
        self.expect_char(':')?;
        self.skip_ws_and_comments();
        let iri = self.read_iriref()?;
        self.prefixes.insert(prefix, iri);
        self.skip_ws_and_comments();
        self.expect_char('.')?;
        Ok(())
    }

    fn read_escaped_string(&mut self) -> Result<String, GraphError> {
        self.expect_char('"')?;
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => value.push(other),
                    None => return Err(self.err("unterminated string literal")),
                },
                Some(c) => value.push(c),
                None => return Err(self.err("unterminated string literal")),
            }
        }
        Ok(value)
    }

    fn read_bare_numeric(&mut self) -> Result<Term, GraphError> {
        let mut text = String::new();
        if matches!(self.peek(), Some('+') | Some('-')) {
            text.push(self.advance().unwrap());
        }
        let mut has_digits = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                has_digits = true;
                self.advance();
            } else {
                break;
            }
        }
        let mut is_decimal = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_decimal = true;
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if !has_digits {
            return Err(self.err("expected numeric literal"));
        }
        let datatype = if is_decimal { crate::ns::XSD_DECIMAL } else { crate::ns::XSD_INTEGER };
        Ok(Term::Literal(Literal::typed(text, Iri::from(datatype))))
    }

    fn read_bare_keyword(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphabetic() {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }
        word
    }

    fn parse_literal(&mut self) -> Result<Term, GraphError> {
        let lexical = self.read_escaped_string()?;
        if self.peek() == Some('@') {
            self.advance();
            let mut lang = String::new();
            while let Some(c) = self.peek() {
                if c.is_alphanumeric() || c == '-' {
                    lang.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            return Ok(Term::Literal(Literal::tagged(lexical, lang)));
        }
        if self.peek() == Some('^') && self.peek_at(1) == Some('^') {
            self.advance();
            self.advance();
            let datatype = if self.peek() == Some('<') { self.read_iriref()? } else { self.read_pname()? };
            return Ok(Term::Literal(Literal::typed(lexical, Iri::from(datatype))));
        }
        Ok(Term::Literal(Literal::plain(lexical)))
    }

    /// Parses a subject/predicate/object position term: IRIREF, prefixed
    /// name, `a` (predicate position only, handled by the caller before this
    /// is reached), string/number/boolean literal.
    fn parse_term(&mut self) -> Result<Term, GraphError> {
        self.skip_ws_and_comments();
        match self.peek() {
            Some('<') => Ok(Term::Iri(Iri::from(self.read_iriref()?))),
            Some('"') => self.parse_literal(),
            Some('[') => Err(self.err("blank node property lists are not supported")),
            Some('(') => Err(self.err("collections are not supported")),
            Some(c) if c.is_ascii_digit() || c == '+' || c == '-' => self.read_bare_numeric(),
            Some(c) if Self::is_pname_char(c) || c == ':' => {
                let save = self.pos;
                let word = self.read_bare_keyword();
                if word == "true" {
                    return Ok(Term::Literal(Literal::typed("true", Iri::from(crate::ns::XSD_BOOLEAN))));
                }
                if word == "false" {
                    return Ok(Term::Literal(Literal::typed("false", Iri::from(crate::ns::XSD_BOOLEAN))));
                }
                self.pos = save;
                Ok(Term::Iri(Iri::from(self.read_pname()?)))
            }
            Some(c) => Err(self.err(format!("unexpected character '{c}'"))),
            None => Err(self.err("unexpected end of input while parsing a term")),
        }
    }

    fn parse_predicate(&mut self) -> Result<Iri, GraphError> {
        self.skip_ws_and_comments();
        if self.peek() == Some('a')
            && !self
                .peek_at(1)
                .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ':')
        {
            self.advance();
            return Ok(Iri::from(RDF_TYPE));
        }
        match self.parse_term()? {
            Term::Iri(iri) => Ok(iri),
            other => Err(self.err(format!("predicate must be an IRI, found {other}"))),
        }
    }

    fn parse_statement(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        self.skip_ws_and_comments();
        let subject = self.parse_term()?;
        if matches!(subject, Term::Literal(_)) {
            return Err(self.err("a literal cannot appear in subject position"));
        }

        loop {
            self.skip_ws_and_comments();
            let predicate = self.parse_predicate()?;

            loop {
                let object = self.parse_term()?;
                graph.add(Triple::new(subject.clone(), predicate.clone(), object));

                self.skip_ws_and_comments();
                if self.peek() == Some(',') {
                    self.advance();
                    continue;
                }
                break;
            }

            self.skip_ws_and_comments();
            if self.peek() == Some(';') {
                self.advance();
                continue;
            }
            break;
        }

        self.skip_ws_and_comments();
        self.expect_char('.')?;
        Ok(())
    }
}

/// Parses `src` as Turtle, producing a [`Graph`]. Unsupported syntax is a
/// [`GraphError::Parse`].
pub fn parse_turtle(src: &str) -> Result<Graph, GraphError> {
    let mut parser = Parser::new(src);
    let mut graph = Graph::new();

    while !parser.at_end() {
        parser.skip_ws_and_comments();
        if parser.peek() == Some('@') {
            parser.parse_prefix_decl()?;
        } else {
            parser.parse_statement(&mut graph)?;
        }
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_names_and_literals() {
        let src = r#"
            @prefix wd: <https://paperhat.dev/ns/wd#> .
            wd:comp1 a wd:Composition ;
                wd:priority 5 ;
                wd:enabled true .
        "#;
        let graph = parse_turtle(src).unwrap();
        assert_eq!(graph.len(), 3);
        let comp = Term::Iri(Iri::from("https://paperhat.dev/ns/wd#comp1"));
        assert!(graph.has_type(&comp, &Iri::from("https://paperhat.dev/ns/wd#Composition")));
    }

    #[test]
    fn parses_object_lists_and_full_iris() {
        let src = "<urn:a> <urn:p> <urn:b>, <urn:c> .";
        let graph = parse_turtle(src).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn parses_typed_and_language_tagged_literals() {
        let src = r#"<urn:a> <urn:p> "3.5"^^<http://www.w3.org/2001/XMLSchema#decimal> .
<urn:a> <urn:q> "hello"@en ."#;
        let graph = parse_turtle(src).unwrap();
        let decimal_obj = graph.objects(&Term::Iri(Iri::from("urn:a")), &Iri::from("urn:p")).next().unwrap();
        match decimal_obj {
            Term::Literal(lit) => assert_eq!(lit.datatype.as_ref().unwrap().as_str(), crate::ns::XSD_DECIMAL),
            _ => panic!("expected literal"),
        }
    }

    #[test]
    fn rejects_blank_node_property_lists() {
        let src = "<urn:a> <urn:p> [ <urn:q> <urn:r> ] .";
        assert!(parse_turtle(src).is_err());
    }
}
