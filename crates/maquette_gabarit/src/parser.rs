//! Four-pass token substitution.
//!
//! Parsing walks the template four times, each pass re-scanning the text
//! the previous pass produced: function bindings first, then scalar
//! bindings, then child declarations (which become slot markers), and
//! finally a sweep that deletes every token still standing. A substitution
//! can therefore introduce tokens for *later* passes but never re-trigger
//! an earlier one, and the output is guaranteed to contain no `${...}`
//! token at all.
//!
//! Within one pass a binding is resolved once per unique name and the
//! result is spliced into every occurrence of its token.

use compact_str::CompactString;
use maquette_socle::slot_marker;
use rustc_hash::FxHashSet;

use crate::error::ParseError;
use crate::scanner::scan;

/// How the binding source classifies one token name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    /// Bound to a callable whose returned text is spliced in.
    Function,
    /// Bound to a displayable value.
    Scalar,
    /// Bound to a child declaration; replaced by a slot marker.
    ChildSlot,
    /// Not bound at all; deleted by the final pass.
    Missing,
    /// Bound to a bare object that is neither displayable nor a child.
    Malformed,
}

/// Binding source a template is parsed against.
///
/// The parser never inspects props itself; the runtime adapts its prop bag
/// to this trait the same way it would adapt any other binding source.
pub trait Bindings {
    /// Class of the given token name.
    fn classify(&self, name: &str) -> TokenClass;

    /// Invoke a `Function` binding. `None` reads as empty text.
    fn invoke(&mut self, name: &str) -> Option<CompactString>;

    /// Display text of a `Scalar` binding.
    fn scalar(&self, name: &str) -> CompactString;
}

/// Result of a successful parse.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedTemplate {
    /// Markup with every token substituted or removed.
    pub markup: String,
    /// Slot names whose tokens became markers, in first-occurrence order,
    /// without duplicates.
    pub used_slots: Vec<CompactString>,
}

/// Substitute every token of `template` against `bindings`.
pub fn parse<B: Bindings>(template: &str, bindings: &mut B) -> Result<ParsedTemplate, ParseError> {
    let mut markup = template.to_string();

    // Pass 1: function bindings. Returned text may introduce tokens for
    // the passes below.
    for name in unique_names(&markup) {
        if bindings.classify(&name) == TokenClass::Function {
            let text = bindings.invoke(&name).unwrap_or_default();
            replace_token(&mut markup, &name, &text);
        }
    }

    // Pass 2: scalar bindings. A bare object here is unusable and aborts
    // the parse.
    for name in unique_names(&markup) {
        match bindings.classify(&name) {
            TokenClass::Scalar => {
                let text = bindings.scalar(&name);
                replace_token(&mut markup, &name, &text);
            }
            TokenClass::Malformed => {
                return Err(ParseError::MalformedChildDeclaration { name });
            }
            _ => {}
        }
    }

    // Pass 3: child declarations become slot markers for the surface to
    // turn into anchors.
    let mut used_slots = Vec::new();
    for name in unique_names(&markup) {
        if bindings.classify(&name) == TokenClass::ChildSlot {
            replace_token(&mut markup, &name, &slot_marker(&name));
            used_slots.push(name);
        }
    }

    // Pass 4: delete whatever token text still remains, unbound names and
    // tokens smuggled in by earlier substitutions alike.
    strip_tokens(&mut markup);

    Ok(ParsedTemplate { markup, used_slots })
}

/// Token names in first-occurrence order, without duplicates.
fn unique_names(markup: &str) -> Vec<CompactString> {
    let mut seen = FxHashSet::default();
    let mut names = Vec::new();
    for token in scan(markup) {
        let name = CompactString::from(token.name);
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

/// Splice `replacement` into every occurrence of the token for `name`.
fn replace_token(markup: &mut String, name: &str, replacement: &str) {
    let token = format!("${{{name}}}");
    *markup = markup.replace(&token, replacement);
}

/// Remove every remaining token, keeping surrounding text intact.
fn strip_tokens(markup: &mut String) {
    let mut out = String::with_capacity(markup.len());
    let mut tail = 0;
    for token in scan(markup) {
        out.push_str(&markup[tail..token.start]);
        tail = token.end;
    }
    if tail == 0 {
        return;
    }
    out.push_str(&markup[tail..]);
    *markup = out;
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use rustc_hash::FxHashMap;

    use super::*;

    /// Binding double backed by a plain map, logging function invocations.
    #[derive(Default)]
    struct FakeBindings {
        entries: FxHashMap<CompactString, FakeBinding>,
        invoked: RefCell<Vec<CompactString>>,
    }

    enum FakeBinding {
        Func(Option<CompactString>),
        Scalar(CompactString),
        Child,
        Object,
    }

    impl FakeBindings {
        fn func(mut self, name: &str, text: Option<&str>) -> Self {
            self.entries.insert(name.into(), FakeBinding::Func(text.map(Into::into)));
            self
        }

        fn scalar(mut self, name: &str, text: &str) -> Self {
            self.entries.insert(name.into(), FakeBinding::Scalar(text.into()));
            self
        }

        fn child(mut self, name: &str) -> Self {
            self.entries.insert(name.into(), FakeBinding::Child);
            self
        }

        fn object(mut self, name: &str) -> Self {
            self.entries.insert(name.into(), FakeBinding::Object);
            self
        }
    }

    impl Bindings for FakeBindings {
        fn classify(&self, name: &str) -> TokenClass {
            match self.entries.get(name) {
                Some(FakeBinding::Func(_)) => TokenClass::Function,
                Some(FakeBinding::Scalar(_)) => TokenClass::Scalar,
                Some(FakeBinding::Child) => TokenClass::ChildSlot,
                Some(FakeBinding::Object) => TokenClass::Malformed,
                None => TokenClass::Missing,
            }
        }

        fn invoke(&mut self, name: &str) -> Option<CompactString> {
            self.invoked.borrow_mut().push(name.into());
            match self.entries.get(name) {
                Some(FakeBinding::Func(text)) => text.clone(),
                _ => None,
            }
        }

        fn scalar(&self, name: &str) -> CompactString {
            match self.entries.get(name) {
                Some(FakeBinding::Scalar(text)) => text.clone(),
                _ => CompactString::default(),
            }
        }
    }

    #[test]
    fn test_scalar_substitution_hits_every_occurrence() {
        let mut bindings = FakeBindings::default().scalar("name", "Ada");
        let parsed = parse("<p>${name} and ${name}</p>", &mut bindings).unwrap();
        assert_eq!(parsed.markup, "<p>Ada and Ada</p>");
    }

    #[test]
    fn test_function_runs_before_scalars() {
        let mut bindings = FakeBindings::default()
            .func("greet", Some("Hello ${name}"))
            .scalar("name", "Ada");
        let parsed = parse("<p>${greet}</p>", &mut bindings).unwrap();
        assert_eq!(parsed.markup, "<p>Hello Ada</p>");
    }

    #[test]
    fn test_function_invoked_once_per_unique_name() {
        let mut bindings = FakeBindings::default().func("stamp", Some("x"));
        let parsed = parse("${stamp}${stamp}${stamp}", &mut bindings).unwrap();
        assert_eq!(parsed.markup, "xxx");
        assert_eq!(bindings.invoked.borrow().len(), 1);
    }

    #[test]
    fn test_function_cannot_reintroduce_a_function_token() {
        // The text returned for `loop` contains its own token; the function
        // pass does not run again, so the final sweep deletes it.
        let mut bindings = FakeBindings::default().func("loop", Some("[${loop}]"));
        let parsed = parse("${loop}", &mut bindings).unwrap();
        assert_eq!(parsed.markup, "[]");
        assert_eq!(bindings.invoked.borrow().len(), 1);
    }

    #[test]
    fn test_function_returning_none_reads_as_empty() {
        let mut bindings = FakeBindings::default().func("silent", None);
        let parsed = parse("a${silent}b", &mut bindings).unwrap();
        assert_eq!(parsed.markup, "ab");
    }

    #[test]
    fn test_child_tokens_become_markers_in_order() {
        let mut bindings = FakeBindings::default().child("header").child("footer");
        let parsed = parse("${header}<hr>${footer}${header}", &mut bindings).unwrap();
        assert_eq!(parsed.markup, "[[#header]]<hr>[[#footer]][[#header]]");
        assert_eq!(parsed.used_slots, vec!["header", "footer"]);
    }

    #[test]
    fn test_unbound_tokens_are_deleted() {
        let mut bindings = FakeBindings::default().scalar("known", "yes");
        let parsed = parse("${known} ${unknown} ${}", &mut bindings).unwrap();
        assert_eq!(parsed.markup, "yes  ");
    }

    #[test]
    fn test_no_token_survives_parsing() {
        let mut bindings = FakeBindings::default()
            .func("f", Some("${ghost}"))
            .scalar("s", "${phantom}");
        let parsed = parse("${f}${s}${missing}", &mut bindings).unwrap();
        assert!(!parsed.markup.contains("${"));
    }

    #[test]
    fn test_unterminated_token_is_literal() {
        let mut bindings = FakeBindings::default().scalar("name", "Ada");
        let parsed = parse("${name} sees ${broken", &mut bindings).unwrap();
        assert_eq!(parsed.markup, "Ada sees ${broken");
    }

    #[test]
    fn test_bare_object_prop_aborts() {
        let mut bindings = FakeBindings::default().object("config");
        let err = parse("<p>${config}</p>", &mut bindings).unwrap_err();
        assert_eq!(err, ParseError::MalformedChildDeclaration { name: "config".into() });
    }

    #[test]
    fn test_functions_already_ran_when_parse_aborts() {
        let mut bindings = FakeBindings::default().func("effect", Some("x")).object("bad");
        let result = parse("${effect}${bad}", &mut bindings);
        assert!(result.is_err());
        assert_eq!(bindings.invoked.borrow().len(), 1);
    }

    #[test]
    fn test_template_without_tokens_is_untouched() {
        let mut bindings = FakeBindings::default();
        let parsed = parse("<div>plain $5 text</div>", &mut bindings).unwrap();
        assert_eq!(parsed.markup, "<div>plain $5 text</div>");
        assert!(parsed.used_slots.is_empty());
    }
}
