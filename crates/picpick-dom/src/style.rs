//! Background cascade over the document arena
//!
//! Sheets and inline declarations are parsed with `cssparser`; selectors are
//! parsed and matched by the `selectors` crate using scraper's selector
//! implementation, with [`StyledNode`] exposing the arena to the matcher.
//! Rules whose selector list fails to parse (pseudo-classes, namespaces) are
//! dropped as a whole. Only `background-image` and the `background`
//! shorthand take part in the cascade, ordered by importance, inline origin,
//! specificity and source order.

use crate::document::{Document, Element, NodeData, NodeId};
use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, StyleSheetParser, Token,
};
use scraper::selector::Simple;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{
    matches_selector, ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext,
    MatchingMode, NeedsSelectorFlags, QuirksMode,
};
use selectors::parser::{ParseRelative, SelectorImpl, SelectorList, SelectorParseErrorKind};
use selectors::{NthIndexCache, OpaqueElement};
use std::ops::Range;
use url::Url;

const BACKGROUND_PROPERTIES: [&str; 2] = ["background-image", "background"];

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Declaration {
    property: String,
    value: String,
    important: bool,
}

#[derive(Debug, Clone)]
struct Rule {
    selectors: SelectorList<Simple>,
    declarations: Vec<Declaration>,
}

/// Parsed embedded style rules
#[derive(Debug, Clone, Default)]
pub(crate) struct Stylesheet {
    rules: Vec<Rule>,
}

impl Stylesheet {
    /// Append rules parsed from `css`
    pub(crate) fn extend(&mut self, css: &str) {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules = SheetParser;
        for result in StyleSheetParser::new(&mut parser, &mut rules) {
            match result {
                Ok(rule) => self.rules.push(rule),
                Err((_, skipped)) => tracing::trace!(rule = skipped, "css rule skipped"),
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.rules.len()
    }
}

/// Winning background declaration for an element: `(property, value)`
pub(crate) fn cascade(doc: &Document, id: NodeId, sheet: &Stylesheet) -> Option<(String, String)> {
    // (important, inline, specificity, rule, declaration)
    type Rank = (bool, bool, u32, usize, usize);

    let node = StyledNode::new(doc, id)?;
    let mut caches = NthIndexCache::default();
    let mut context = MatchingContext::new(
        MatchingMode::Normal,
        None,
        &mut caches,
        QuirksMode::NoQuirks,
        NeedsSelectorFlags::No,
        IgnoreNthChildForInvalidation::No,
    );

    let mut candidates: Vec<(Rank, &Declaration)> = Vec::new();
    for (rule_idx, rule) in sheet.rules.iter().enumerate() {
        let Some(specificity) = rule
            .selectors
            .0
            .iter()
            .filter(|selector| matches_selector(*selector, 0, None, &node, &mut context))
            .map(|selector| selector.specificity())
            .max()
        else {
            continue;
        };
        for (decl_idx, decl) in rule.declarations.iter().enumerate() {
            candidates.push(((decl.important, false, specificity, rule_idx, decl_idx), decl));
        }
    }

    let inline = node.element.attr("style").map(parse_declarations).unwrap_or_default();
    for (decl_idx, decl) in inline.iter().enumerate() {
        candidates.push(((decl.important, true, 0, 0, decl_idx), decl));
    }

    candidates
        .into_iter()
        .filter(|(_, decl)| BACKGROUND_PROPERTIES.contains(&decl.property.as_str()))
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, decl)| (decl.property.clone(), decl.value.clone()))
}

/// Bodies of every `url(...)` token in a value, unescaped
///
/// Tokens nested in other functions (`image-set(...)`) are included.
pub(crate) fn url_bodies(value: &str) -> Vec<String> {
    url_tokens(value).into_iter().map(|(_, body)| body).collect()
}

/// Rewrite every `url(...)` token as a quoted absolute `url("...")`
///
/// `data:` URIs are kept as they are.
pub(crate) fn absolutize_urls(value: &str, base: &Url) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    for (span, body) in url_tokens(value) {
        out.push_str(&value[last..span.start]);
        let resolved = if body.starts_with("data:") {
            body
        } else {
            base.join(&body).map_or(body, String::from)
        };
        out.push_str(&quoted_url(&resolved));
        last = span.end;
    }
    out.push_str(&value[last..]);
    out
}

/// `url("...")` with the body escaped as a CSS string
pub(crate) fn quoted_url(body: &str) -> String {
    let mut out = String::from("url(");
    // Writing into a String cannot fail
    let _ = cssparser::serialize_string(body, &mut out);
    out.push(')');
    out
}

fn url_tokens(value: &str) -> Vec<(Range<usize>, String)> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut out = Vec::new();
    collect_urls(&mut parser, &mut out);
    out
}

fn collect_urls(input: &mut Parser<'_, '_>, out: &mut Vec<(Range<usize>, String)>) {
    loop {
        input.skip_whitespace();
        let start = input.position().byte_index();
        let Ok(token) = input.next().cloned() else {
            break;
        };
        match token {
            Token::UnquotedUrl(body) => {
                out.push((start..input.position().byte_index(), body.to_string()));
            }
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                let body: Result<String, ParseError<'_, ()>> = input.parse_nested_block(|nested| {
                    let body = nested.expect_string()?.to_string();
                    Ok(body)
                });
                if let Ok(body) = body {
                    out.push((start..input.position().byte_index(), body));
                }
            }
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock => {
                let _: Result<(), ParseError<'_, ()>> = input.parse_nested_block(|nested| {
                    collect_urls(nested, out);
                    Ok(())
                });
            }
            _ => {}
        }
    }
}

fn parse_declarations(block: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(block);
    let mut parser = Parser::new(&mut input);
    declaration_list(&mut parser)
}

fn declaration_list(input: &mut Parser<'_, '_>) -> Vec<Declaration> {
    let mut collector = DeclarationCollector;
    RuleBodyParser::new(input, &mut collector)
        .filter_map(Result::ok)
        .collect()
}

/// Top-level rule parser; at-rules are rejected and skipped whole
struct SheetParser;

impl<'i> QualifiedRuleParser<'i> for SheetParser {
    type Prelude = SelectorList<Simple>;
    type QualifiedRule = Rule;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_prelude<'t>(&mut self, input: &mut Parser<'i, 't>) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        SelectorList::parse(&scraper::selector::Parser, input, ParseRelative::No)
    }

    fn parse_block<'t>(
        &mut self,
        selectors: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        Ok(Rule {
            selectors,
            declarations: declaration_list(input),
        })
    }
}

impl<'i> AtRuleParser<'i> for SheetParser {
    type Prelude = ();
    type AtRule = Rule;
    type Error = SelectorParseErrorKind<'i>;
}

/// Declaration block parser keeping raw value text
struct DeclarationCollector;

impl<'i> DeclarationParser<'i> for DeclarationCollector {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let start = input.position();
        let mut end = start;
        let mut important = false;
        while !input.is_exhausted() {
            if input.try_parse(cssparser::parse_important).is_ok() {
                important = true;
                break;
            }
            let token = input.next()?.clone();
            if matches!(
                token,
                Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock
            ) {
                input.parse_nested_block(|nested| {
                    while nested.next().is_ok() {}
                    Ok::<(), ParseError<'i, ()>>(())
                })?;
            }
            end = input.position();
        }
        Ok(Declaration {
            property: name.to_ascii_lowercase(),
            value: input.slice(start..end).trim().to_string(),
            important,
        })
    }
}

impl<'i> AtRuleParser<'i> for DeclarationCollector {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for DeclarationCollector {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, Declaration, ()> for DeclarationCollector {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

/// An attached element as seen by the selector matcher
#[derive(Debug, Clone, Copy)]
struct StyledNode<'a> {
    doc: &'a Document,
    id: NodeId,
    element: &'a Element,
}

impl<'a> StyledNode<'a> {
    fn new(doc: &'a Document, id: NodeId) -> Option<Self> {
        doc.element(id).map(|element| Self { doc, id, element })
    }

    fn siblings(&self) -> Vec<NodeId> {
        self.doc
            .parent_element(self.id)
            .map(|parent| self.doc.element_children(parent))
            .unwrap_or_default()
    }

    fn sibling(&self, offset: isize) -> Option<Self> {
        let siblings = self.siblings();
        let index = siblings.iter().position(|&id| id == self.id)?;
        let target = index.checked_add_signed(offset)?;
        siblings.get(target).and_then(|&id| Self::new(self.doc, id))
    }
}

type LocalName = <Simple as SelectorImpl>::LocalName;
type Identifier = <Simple as SelectorImpl>::Identifier;

impl selectors::Element for StyledNode<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.element)
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc
            .parent_element(self.id)
            .and_then(|parent| Self::new(self.doc, parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.sibling(-1)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.sibling(1)
    }

    fn first_element_child(&self) -> Option<Self> {
        self.doc
            .element_children(self.id)
            .first()
            .and_then(|&child| Self::new(self.doc, child))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, local_name: &<Simple as SelectorImpl>::BorrowedLocalName) -> bool {
        self.element.name() == &*local_name.0
    }

    fn has_namespace(&self, ns: &<Simple as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
        ns.is_empty() || &**ns == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.element.name() == other.element.name()
    }

    fn attr_matches(
        &self,
        _ns: &NamespaceConstraint<&<Simple as SelectorImpl>::NamespaceUrl>,
        local_name: &LocalName,
        operation: &AttrSelectorOperation<&<Simple as SelectorImpl>::AttrValue>,
    ) -> bool {
        let name: &str = &local_name.0;
        let value = if name == "class" {
            Some(self.element.classes().join(" "))
        } else {
            self.element.attr(name).map(str::to_string)
        };
        value.is_some_and(|value| operation.eval_str(&value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &<Simple as SelectorImpl>::NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &<Simple as SelectorImpl>::PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.element.name(), "a" | "area" | "link") && self.element.attr("href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &Identifier, case_sensitivity: CaseSensitivity) -> bool {
        let own = self.element.id();
        !own.is_empty() && case_sensitivity.eq(own.as_bytes(), id.0.as_bytes())
    }

    fn has_class(&self, name: &Identifier, case_sensitivity: CaseSensitivity) -> bool {
        self.element
            .classes()
            .iter()
            .any(|class| case_sensitivity.eq(class.as_bytes(), name.0.as_bytes()))
    }

    fn imported_part(&self, _name: &Identifier) -> Option<Identifier> {
        None
    }

    fn is_part(&self, _name: &Identifier) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.doc.children(self.id).iter().all(|&child| match self.doc.data(child) {
            Some(NodeData::Element(_)) => false,
            Some(NodeData::Text(text)) => text.is_empty(),
            _ => true,
        })
    }

    fn is_root(&self) -> bool {
        self.doc.parent_element(self.id).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> Url {
        Url::parse("https://example.com/css/site.css").unwrap()
    }

    fn background(html: &str, tag: &str) -> Option<String> {
        let doc = Document::parse(html, Url::parse("https://example.com/page/").unwrap());
        let id = doc.elements_by_tag(tag)[0];
        doc.computed_background_image(id)
    }

    #[test]
    fn comments_at_rules_and_bad_selectors_are_skipped() {
        let mut sheet = Stylesheet::default();
        sheet.extend(
            "/* header */ @import url(a.css); @media print { div { color: red } } \
             div { background: none } a:hover { color: red } p { color: blue }",
        );
        assert_eq!(sheet.len(), 2);
    }

    #[test]
    fn declarations_respect_quotes_and_parens() {
        let decls = parse_declarations(
            r#"background-image: url("data:image/png;base64,AAAA") !important; color: red"#,
        );
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].property, "background-image");
        assert_eq!(decls[0].value, r#"url("data:image/png;base64,AAAA")"#);
        assert!(decls[0].important);
        assert!(!decls[1].important);
    }

    #[test]
    fn url_bodies_are_found_and_unescaped() {
        let bodies = url_bodies(r#"url(a.png), URL('b.png') no-repeat, image-set(url("c\"d.png") 1x)"#);
        assert_eq!(bodies, ["a.png", "b.png", "c\"d.png"]);
    }

    #[test]
    fn absolutize_keeps_data_uris() {
        let out = absolutize_urls("url('../img/x.png'), url(data:image/gif;base64,R0) no-repeat", &base());
        assert_eq!(
            out,
            r#"url("https://example.com/img/x.png"), url("data:image/gif;base64,R0") no-repeat"#
        );
    }

    #[test]
    fn quoted_data_uri_with_spaces_survives() {
        let svg = "data:image/svg+xml;utf8,<svg xmlns='http://www.w3.org/2000/svg'></svg>";
        let value = format!(r#"url("{svg}")"#);
        let out = absolutize_urls(&value, &base());
        assert_eq!(url_bodies(&out), [svg]);
    }

    #[test]
    fn specificity_beats_order() {
        let html = r#"<style>
            #hero { background-image: url(id.png) }
            div { background-image: url(tag.png) }
        </style><div id="hero"></div>"#;
        assert_eq!(
            background(html, "div").as_deref(),
            Some(r#"url("https://example.com/page/id.png")"#)
        );
    }

    #[test]
    fn inline_beats_sheet_unless_important() {
        let html = r#"<style>.a { background-image: url(sheet.png) }</style>
            <div class="a" style="background-image: url(inline.png)"></div>"#;
        assert_eq!(
            background(html, "div").as_deref(),
            Some(r#"url("https://example.com/page/inline.png")"#)
        );

        let html = r#"<style>.a { background-image: url(sheet.png) !important }</style>
            <div class="a" style="background-image: url(inline.png)"></div>"#;
        assert_eq!(
            background(html, "div").as_deref(),
            Some(r#"url("https://example.com/page/sheet.png")"#)
        );
    }

    #[test]
    fn shorthand_contributes_urls_only() {
        let html = r#"<div style="background: #fff url(/bg.jpg) no-repeat center"></div>"#;
        assert_eq!(
            background(html, "div").as_deref(),
            Some(r#"url("https://example.com/bg.jpg")"#)
        );
        assert_eq!(background(r#"<div style="background: red"></div>"#, "div"), None);
    }

    #[test]
    fn none_yields_nothing() {
        let html = r#"<style>div { background-image: url(a.png) }</style>
            <div style="background-image: none"></div>"#;
        assert_eq!(background(html, "div"), None);
    }

    #[test]
    fn combinators_match_ancestry() {
        let html = r#"<style>
            section > .card { background-image: url(child.png) }
            main .tile { background-image: url(desc.png) }
        </style>
        <main><section><p class="card tile"></p></section></main>"#;
        // equal specificity, later rule wins
        assert_eq!(
            background(html, "p").as_deref(),
            Some(r#"url("https://example.com/page/desc.png")"#)
        );

        let html = r#"<style>section > .card { background-image: url(child.png) }</style>
            <section><div><p class="card"></p></div></section>"#;
        assert_eq!(background(html, "p"), None);
    }

    #[test]
    fn siblings_and_attributes_match() {
        let html = r#"<style>
            h1 + p { background-image: url(next.png) }
            [data-kind="hero"] { background-image: url(attr.png) }
        </style>
        <h1></h1><p></p><span data-kind="hero"></span>"#;
        assert_eq!(
            background(html, "p").as_deref(),
            Some(r#"url("https://example.com/page/next.png")"#)
        );
        assert_eq!(
            background(html, "span").as_deref(),
            Some(r#"url("https://example.com/page/attr.png")"#)
        );
    }
}
