use super::*;

use crate::options::ValidationFlags;
use crate::query::QueryNodeKind;
use crate::registry::{QueryEnum, Value, DEFAULT_OPERATORS};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    Admin,
    Member,
    Guest,
}

impl QueryEnum for Role {
    fn variants() -> &'static [(&'static str, Self)] {
        &[
            ("admin", Role::Admin),
            ("member", Role::Member),
            ("guest", Role::Guest),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Person {
    name: &'static str,
    age: i64,
    active: bool,
    role: Role,
    tags: Vec<&'static str>,
    email: Option<&'static str>,
    scores: Vec<(&'static str, i64)>,
}

fn person(
    name: &'static str,
    age: i64,
    active: bool,
    role: Role,
    tags: &[&'static str],
) -> Person {
    Person {
        name,
        age,
        active,
        role,
        tags: tags.to_vec(),
        email: None,
        scores: Vec::new(),
    }
}

fn people() -> Vec<Person> {
    vec![
        Person {
            email: Some("al@bundy.example"),
            scores: vec![("math", 40), ("art", 95)],
            ..person("Al Bundy", 45, false, Role::Member, &["red", "shoes"])
        },
        person("Bo", 17, true, Role::Guest, &["blue"]),
        Person {
            email: Some("ce@ce.example"),
            scores: vec![("math", 92)],
            ..person("Ce Ce", 30, true, Role::Admin, &["green", "red"])
        },
        person("Dora", 64, false, Role::Admin, &["blue", "green"]),
        person("Eve", 65, true, Role::Member, &[]),
        person("Frank", 18, false, Role::Guest, &["foobar"]),
        person("Gus", 52, true, Role::Member, &["foo", "bar"]),
    ]
}

fn configure(engine: &mut QueryEngine<Person>) {
    engine
        .register_filter(Filter::new("name", |person: &Person| person.name.to_string()))
        .expect("name filter");
    engine
        .register_filter(Filter::new("age", |person: &Person| person.age))
        .expect("age filter");
    engine
        .register_filter(Filter::new("active", |person: &Person| person.active))
        .expect("active filter");
    engine
        .register_operator_handler::<Role, Role, _>("=", |left, right, _| left == right)
        .expect("role equality");
    engine
        .register_operator_handler::<Role, Role, _>("!=", |left, right, _| left != right)
        .expect("role inequality");
    engine
        .register_filter(
            Filter::new("role", |person: &Person| person.role).with_operators(["=", "!="]),
        )
        .expect("role filter");
    engine
        .set_search_data_source(|person: &Person| person.tags.clone(), None)
        .expect("search source");
}

fn engine() -> QueryEngine<Person> {
    let mut engine = QueryEngine::new();
    configure(&mut engine);
    engine
}

fn names_matching(engine: &QueryEngine<Person>, text: &str) -> Vec<&'static str> {
    let query = engine.parse(text);
    assert!(
        query.is_valid(),
        "{text:?} should be valid, got {:?}",
        query.errors()
    );
    let people = people();
    query
        .apply(people.iter())
        .expect("valid query")
        .map(|person| person.expect("evaluation").name)
        .collect()
}

fn names_where(predicate: impl Fn(&Person) -> bool) -> Vec<&'static str> {
    people()
        .into_iter()
        .filter(|person| predicate(person))
        .map(|person| person.name)
        .collect()
}

fn reasons(engine: &QueryEngine<Person>, text: &str) -> Vec<String> {
    engine
        .parse(text)
        .errors()
        .iter()
        .map(|error| error.reason.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

#[test]
fn adjacent_terms_are_implicitly_anded() {
    let engine = engine();
    let implicit = engine.parse("name:e age>30");
    let explicit = engine.parse("name:e and age>30");
    assert_eq!(implicit.identifier(), explicit.identifier());
    assert_eq!(
        names_matching(&engine, "name:e age>30"),
        names_where(|person| person.name.to_lowercase().contains('e') && person.age > 30)
    );
}

#[test]
fn dash_and_not_are_equivalent() {
    let engine = engine();
    assert_eq!(
        names_matching(&engine, "-active=true"),
        names_matching(&engine, "not active=true")
    );
    assert_eq!(
        names_matching(&engine, "-(age<20 or red)"),
        names_where(|person| !(person.age < 20 || person.tags.iter().any(|tag| tag.contains("red"))))
    );
}

#[test]
fn and_binds_tighter_than_or() {
    let engine = engine();
    assert_eq!(
        names_matching(&engine, "age<20 or active=true and age>60"),
        names_where(|person| person.age < 20 || (person.active && person.age > 60))
    );
    assert_eq!(
        names_matching(&engine, "(age<20 or active=true) and age>60"),
        names_where(|person| (person.age < 20 || person.active) && person.age > 60)
    );
}

#[test]
fn not_binds_tighter_than_and() {
    let engine = engine();
    let query = engine.parse("not active=true age>40");
    assert_eq!(
        query.identifier().as_deref(),
        Some("(not active=true and age>40)")
    );
}

#[test]
fn filter_tokens_are_case_insensitive() {
    let engine = engine();
    assert_eq!(
        names_matching(&engine, "AGE>60"),
        names_matching(&engine, "age>60")
    );
    assert_eq!(
        names_matching(&engine, "name:\"al b\""),
        vec!["Al Bundy"]
    );
}

#[test]
fn age_range_with_two_filters() {
    let engine = engine();
    assert_eq!(
        names_matching(&engine, "age>=18 age<65"),
        names_where(|person| (18..65).contains(&person.age))
    );
}

#[test]
fn empty_groups_contribute_nothing() {
    let engine = engine();
    assert_eq!(
        names_matching(&engine, "age>60 ()"),
        names_matching(&engine, "age>60")
    );
    let empty = engine.parse("()");
    assert!(empty.is_empty());
    assert!(!empty.is_valid());
}

// ---------------------------------------------------------------------------
// Search words
// ---------------------------------------------------------------------------

#[test]
fn exact_words_match_whole_strings_only() {
    let engine = engine();
    assert_eq!(names_matching(&engine, "!foo"), vec!["Gus"]);
    assert_eq!(names_matching(&engine, "foo"), vec!["Frank", "Gus"]);
    assert_eq!(names_matching(&engine, "!\"foo\""), vec!["Gus"]);
}

#[test]
fn search_words_are_sorted_and_deduplicated() {
    let engine = engine();
    let query = engine.parse("red \"big shoes\" age>3 or red !blue");
    assert_eq!(query.search_words(), vec!["big shoes", "blue", "red"]);
}

#[test]
fn search_words_need_a_data_source() {
    let mut engine = QueryEngine::<Person>::new();
    engine
        .register_filter(Filter::new("age", |person: &Person| person.age))
        .expect("age filter");
    assert_eq!(
        reasons(&engine, "age>3 red"),
        vec!["Cannot use a search word without setting the search data callback"]
    );

    let mut lenient = QueryEngine::<Person>::new();
    lenient
        .set_validation(ValidationFlags::empty())
        .expect("validation");
    let query = lenient.parse("red");
    assert!(query.is_valid());
    assert!(!query.matches(&people()[0]).expect("evaluation"));
}

#[test]
fn search_source_comparison_overrides_global() {
    let mut engine = QueryEngine::<Person>::new();
    engine
        .set_search_data_source(
            |person: &Person| [person.name],
            Some(StringComparison::CaseSensitive),
        )
        .expect("search source");
    assert_eq!(names_matching(&engine, "bo"), Vec::<&str>::new());
    assert_eq!(names_matching(&engine, "Bo"), vec!["Bo"]);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn unbalanced_parentheses_invalidate_the_query() {
    let engine = engine();
    for text in ["(age>1 and active=true", "age>1)", "((red)"] {
        let query = engine.parse(text);
        assert!(!query.is_valid(), "{text:?} should be invalid");
        assert!(
            query
                .errors()
                .iter()
                .any(|error| error.reason == "Unbalanced parenthesis"),
            "{text:?}: {:?}",
            query.errors()
        );
        assert!(query.is_empty());
    }
}

#[test]
fn parentheses_inside_phrases_do_not_count() {
    let engine = engine();
    let query = engine.parse("(\"a)b\" or red)");
    assert!(query.is_valid(), "{:?}", query.errors());
}

#[test]
fn unknown_filters_are_reported_with_their_position() {
    let engine = engine();
    let query = engine.parse("height>3 age>30");
    assert!(!query.is_valid());
    assert_eq!(query.errors().len(), 1);
    let error = &query.errors()[0];
    assert_eq!(error.reason, "Unknown filter type");
    assert_eq!((error.index, error.length), (0, 6));
}

#[test]
fn skipped_unknown_filters_collapse_their_combinators() {
    let mut engine = QueryEngine::with_options(QueryEngineOptions {
        validation: ValidationFlags::VALIDATE_FILTERS | ValidationFlags::SKIP_UNKNOWN_FILTERS,
        ..QueryEngineOptions::default()
    });
    configure(&mut engine);

    let expected = names_matching(&engine, "age>30");
    for text in [
        "height>3 age>30",
        "age>30 and height>3",
        "-height>3 or age>30",
        "(height>3 or height<1) age>30",
    ] {
        let query = engine.parse(text);
        assert!(query.is_valid(), "{text:?}: {:?}", query.errors());
        assert_eq!(query.identifier().as_deref(), Some("age>30"));
        assert_eq!(names_matching(&engine, text), expected);
    }
    assert!(engine.parse("height>3").is_empty());
}

#[test]
fn errors_in_groups_use_outer_offsets() {
    let engine = engine();
    let text = "age>1 and (active=true or (red and height>2))";
    let query = engine.parse(text);
    let error = query.errors().first().expect("unknown filter error");
    assert_eq!(error.index, text.find("height").expect("height in text"));
}

#[test]
fn dangling_combinators_are_reported() {
    let engine = engine();
    assert_eq!(
        reasons(&engine, "age>1 and"),
        vec!["Missing right operand for \"and\""]
    );
    assert_eq!(
        reasons(&engine, "or age>1"),
        vec!["Missing left operand for \"or\""]
    );

    let query = engine.parse("age>1 not");
    let error = query.errors().first().expect("missing operand");
    assert_eq!(error.reason, "Missing operand for \"not\"");
    assert_eq!(error.index, 9);
}

#[test]
fn unsupported_operators_are_rejected() {
    let engine = engine();
    assert_eq!(
        reasons(&engine, "role<admin"),
        vec!["Operator \"<\" is not supported by filter \"role\""]
    );
}

#[test]
fn values_that_cannot_be_parsed_are_rejected() {
    let mut engine = engine();
    engine
        .register_filter(Filter::resolver(
            "older",
            |person: &Person, _: &str, years: &i64, _| person.age > *years,
        ))
        .expect("resolver filter");
    assert_eq!(
        reasons(&engine, "older:abc"),
        vec!["The value abc could not be converted to any of the supported handler types."]
    );
}

#[test]
fn narrow_value_types_are_checked_while_parsing() {
    let mut engine = engine();
    engine
        .register_filter(Filter::resolver(
            "small",
            |person: &Person, _: &str, limit: &u8, _| person.age < i64::from(*limit),
        ))
        .expect("small filter");
    engine
        .register_filter(Filter::with_param(
            "initials",
            |person: &Person, count: &usize| person.name.chars().take(*count).collect::<String>(),
        ))
        .expect("initials filter");

    assert_eq!(
        reasons(&engine, "small:300"),
        vec!["The value 300 could not be converted to any of the supported handler types."]
    );
    assert_eq!(
        reasons(&engine, "initials(-1):al"),
        vec!["The parameter -1 could not be converted to int"]
    );
    assert_eq!(
        names_matching(&engine, "small:18"),
        names_where(|person| person.age < 18)
    );
    assert_eq!(names_matching(&engine, "initials(2):al"), vec!["Al Bundy"]);
}

#[test]
fn unreadable_characters_are_reported() {
    let engine = engine();
    let query = engine.parse("age>1 !");
    assert!(!query.is_valid());
    let error = query.errors().first().expect("lexical error");
    assert_eq!(error.reason, "No token could be deduced");
    assert_eq!(error.index, 6);
}

#[test]
fn operators_without_a_handler_for_the_filter_type_are_rejected() {
    let mut engine = engine();
    engine.register_operator("~").expect("operator");
    engine
        .register_operator_handler::<String, String, _>("~", |left, right, _| {
            left.starts_with(right.as_str())
        })
        .expect("prefix handler");

    let query = engine.parse("age~5");
    assert!(!query.is_valid());
    assert_eq!(query.errors().len(), 1);
    let error = &query.errors()[0];
    assert_eq!(
        error.reason,
        "No handler of type (int, int) found for operator \"~\""
    );
    assert_eq!(error.index, 4);
}

#[test]
fn incomplete_operators_are_not_read_as_shorter_ones() {
    let engine = engine();
    for text in ["age>=", "age<=", "age==", "age>==3"] {
        let query = engine.parse(text);
        assert!(query.is_valid(), "{text:?}: {:?}", query.errors());
        assert!(
            query
                .graph()
                .iter()
                .all(|(_, node)| !matches!(node.kind(), QueryNodeKind::Filter(_))),
            "{text:?} should not compile a filter"
        );
        assert_eq!(query.search_words(), vec![text.to_string()]);
    }
    assert_eq!(
        names_matching(&engine, "name:\"=\""),
        Vec::<&str>::new()
    );
}

#[test]
fn invalid_queries_refuse_to_match() {
    let engine = engine();
    let query = engine.parse("(age>1");
    assert!(!query.is_valid());
    assert!(matches!(
        query.apply(people()),
        Err(QueryEngineError::InvalidQuery(_))
    ));
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[test]
fn registration_is_sealed_after_the_first_parse() {
    let mut engine = engine();
    assert!(!engine.is_sealed());
    let _ = engine.parse("age>1");
    assert!(engine.is_sealed());

    let result = engine.register_filter(Filter::new("email", |person: &Person| {
        person.email.unwrap_or_default().to_string()
    }));
    assert!(matches!(result, Err(QueryEngineError::Sealed(_))));
    assert!(matches!(
        engine.register_operator("~"),
        Err(QueryEngineError::Sealed(_))
    ));
    assert!(matches!(
        engine.set_global_string_comparison(StringComparison::CaseSensitive),
        Err(QueryEngineError::Sealed(_))
    ));
}

#[test]
fn registration_rejects_bad_definitions() {
    let mut engine = engine();
    assert!(matches!(
        engine.register_filter(Filter::new("AGE", |person: &Person| person.age)),
        Err(QueryEngineError::DuplicateFilter(token)) if token == "age"
    ));
    assert!(matches!(
        engine.register_filter(Filter::new("my age", |person: &Person| person.age)),
        Err(QueryEngineError::InvalidToken(_))
    ));
    assert!(matches!(
        engine.register_filter(Filter::new("nick", |person: &Person| person.name.to_string()).with_operators(["~"])),
        Err(QueryEngineError::UnknownOperator(operator)) if operator == "~"
    ));
    assert!(matches!(
        engine.register_operator_handler::<String, String, _>("~", |_, _, _| true),
        Err(QueryEngineError::UnknownOperator(_))
    ));
    assert!(matches!(
        engine.register_operator("a b"),
        Err(QueryEngineError::InvalidToken(_))
    ));
}

#[test]
fn filters_without_any_handler_are_rejected() {
    let mut engine = engine();
    engine.register_operator("~").expect("operator");
    let result = engine.register_filter(
        Filter::new("tagged", |person: &Person| !person.tags.is_empty()).with_operators(["~"]),
    );
    assert!(matches!(
        result,
        Err(QueryEngineError::MissingHandler { value_type: ValueType::Bool, .. })
    ));
}

#[test]
fn enum_filters_use_their_handlers() {
    let engine = engine();
    assert_eq!(
        names_matching(&engine, "role=ADMIN"),
        names_where(|person| person.role == Role::Admin)
    );
    assert_eq!(
        names_matching(&engine, "role!=guest active=true"),
        names_where(|person| person.role != Role::Guest && person.active)
    );
}

#[test]
fn custom_operators_extend_the_grammar() {
    let mut engine = engine();
    engine.register_operator("~").expect("operator");
    engine
        .register_operator_handler::<String, String, _>("~", |left, right, _| {
            left.starts_with(right.as_str())
        })
        .expect("prefix handler");
    assert_eq!(names_matching(&engine, "name~Do"), vec!["Dora"]);
    assert!(engine.operator_tokens().any(|token| token == "~"));
}

#[test]
fn parameterized_filters_require_their_parameter() {
    let mut engine = engine();
    engine
        .register_filter(Filter::with_param(
            "score",
            |person: &Person, subject: &String| {
                person
                    .scores
                    .iter()
                    .find(|(name, _)| *name == subject.as_str())
                    .map_or(0, |(_, score)| *score)
            },
        ))
        .expect("score filter");

    assert_eq!(names_matching(&engine, "score(math)>=90"), vec!["Ce Ce"]);
    assert_eq!(names_matching(&engine, "score(art)>90"), vec!["Al Bundy"]);
    assert_eq!(
        reasons(&engine, "score>=90"),
        vec!["Filter \"score\" requires a parameter"]
    );
    assert_eq!(
        reasons(&engine, "age(years)>3"),
        vec!["Filter \"age\" does not take a parameter"]
    );
}

#[test]
fn resolver_filters_handle_operators_themselves() {
    let mut engine = engine();
    engine
        .register_filter(Filter::resolver(
            "older",
            |person: &Person, operator: &str, years: &i64, _| match operator {
                ":" | ">" => person.age > *years,
                "<" => person.age < *years,
                _ => false,
            },
        ))
        .expect("resolver filter");
    assert_eq!(names_matching(&engine, "older:60"), vec!["Dora", "Eve"]);
    assert_eq!(
        names_matching(&engine, "older<18"),
        names_where(|person| person.age < 18)
    );
}

#[test]
fn default_filter_handles_unknown_tokens() {
    let mut engine = engine();
    engine
        .set_default_filter_handler(|person: &Person, token: &str, _: &str, value: &str| {
            token == "nick" && person.name.to_lowercase().starts_with(value)
        })
        .expect("default filter");
    assert_eq!(names_matching(&engine, "nick:do"), vec!["Dora"]);
}

#[test]
fn custom_type_parsers_run_first() {
    let mut engine = engine();
    engine
        .register_type_parser::<i64, _>(|raw: &str| raw.strip_suffix('y')?.parse().ok())
        .expect("years parser");
    assert_eq!(
        names_matching(&engine, "age>=60y"),
        names_matching(&engine, "age>=60")
    );
    assert_eq!(names_matching(&engine, "name:ray"), Vec::<&str>::new());
}

#[test]
fn replacing_a_type_parser_keeps_its_place() {
    let mut engine = engine();
    engine
        .register_type_parser::<i64, _>(|raw: &str| raw.strip_suffix('y')?.parse().ok())
        .expect("years parser");
    engine
        .register_type_parser::<f64, _>(|raw: &str| raw.strip_suffix('%')?.parse().ok())
        .expect("percent parser");
    engine
        .register_type_parser::<i64, _>(|raw: &str| raw.strip_suffix('d')?.parse().ok())
        .expect("days parser");

    let parsers = engine.custom_parsers();
    assert_eq!(
        parsers.iter().map(TypeParser::value_type).collect::<Vec<_>>(),
        vec![ValueType::Int, ValueType::Float]
    );
    assert_eq!(parsers[0].parse("5d"), Some(Value::Int(5)));
    assert_eq!(parsers[0].parse("5y"), None);
}

#[test]
fn fallible_getters_report_context() {
    let mut engine = engine();
    engine
        .register_filter(Filter::try_new("email", |person: &Person| {
            person.email.map(str::to_string).ok_or("missing email")
        }))
        .expect("email filter");

    let query = engine.parse("email:example");
    assert!(query.is_valid());
    let people = people();
    let results = query.apply(&people).expect("valid query").collect::<Vec<_>>();

    assert_eq!(results[0].as_ref().map(|person| person.name).ok(), Some("Al Bundy"));
    match &results[1] {
        Err(QueryEngineError::Evaluation {
            filter,
            operator,
            value,
            ..
        }) => {
            assert_eq!((filter.as_str(), operator.as_str(), value.as_str()), ("email", ":", "example"));
        }
        other => panic!("expected an evaluation error, got {other:?}"),
    }
    assert!(results[1]
        .as_ref()
        .err()
        .map(|err| err.to_string().contains("missing email"))
        .unwrap_or(false));
}

#[test]
fn introspection_lists_tokens() {
    let engine = engine();
    assert_eq!(engine.filter_tokens(), vec!["active", "age", "name", "role"]);
    assert_eq!(
        engine.operator_tokens().collect::<Vec<_>>(),
        DEFAULT_OPERATORS.to_vec()
    );
    let role = engine.filter("Role").expect("role filter");
    assert_eq!(role.value_type(), ValueType::custom::<Role>());
}

#[test]
fn removed_filters_become_unknown() {
    let mut engine = engine();
    assert!(engine.remove_filter("Age").expect("unsealed"));
    assert!(!engine.remove_filter("age").expect("unsealed"));
    assert_eq!(reasons(&engine, "age>3"), vec!["Unknown filter type"]);
}

// ---------------------------------------------------------------------------
// Evaluation and optimization
// ---------------------------------------------------------------------------

#[test]
fn par_apply_matches_sequential_apply() {
    let engine = engine();
    let query = engine.parse("age>20 or red");
    let people = people();
    let parallel = query
        .par_apply(&people)
        .expect("valid query")
        .into_iter()
        .map(|person| person.name)
        .collect::<Vec<_>>();
    assert_eq!(parallel, names_matching(&engine, "age>20 or red"));
}

#[test]
fn optimize_keeps_results() {
    let engine = engine();
    for text in [
        "-(age>30 and active=true) or name:bo",
        "-active=true age>30",
        "not (red or not (blue and age<50))",
    ] {
        let before = names_matching(&engine, text);
        let mut query = engine.parse(text);
        query.optimize(true, true);
        let people = people();
        let after = query
            .apply(people.iter())
            .expect("valid query")
            .map(|person| person.expect("evaluation").name)
            .collect::<Vec<_>>();
        assert_eq!(after, before, "{text:?}");
    }

    let mut query = engine.parse("-active=true age>30");
    query.optimize(false, true);
    assert_eq!(
        query.identifier().as_deref(),
        Some("(age>30 and not active=true)")
    );
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

mod properties {
    use super::*;
    use proptest::prelude::*;

    const OPERATORS: &[&str] = &[">", ">=", "<", "<=", "=", "!="];
    const NAMES: &[&str] = &["al", "bo", "ce", "e"];
    const WORDS: &[&str] = &["red", "blue", "green", "foo"];

    #[derive(Debug, Clone)]
    enum Expr {
        Age(&'static str, i64),
        Active(bool),
        Name(&'static str),
        Word(&'static str),
        Not(Box<Expr>, bool),
        And(Box<Expr>, Box<Expr>, bool),
        Or(Box<Expr>, Box<Expr>),
    }

    impl Expr {
        fn render(&self) -> String {
            match self {
                Expr::Age(operator, age) => format!("age{operator}{age}"),
                Expr::Active(active) => format!("active={active}"),
                Expr::Name(name) => format!("name:{name}"),
                Expr::Word(word) => word.to_string(),
                Expr::Not(inner, true) => format!("-{}", inner.render()),
                Expr::Not(inner, false) => format!("not {}", inner.render()),
                Expr::And(left, right, true) => format!("({} {})", left.render(), right.render()),
                Expr::And(left, right, false) => {
                    format!("({} and {})", left.render(), right.render())
                }
                Expr::Or(left, right) => format!("({} or {})", left.render(), right.render()),
            }
        }

        fn eval(&self, person: &Person) -> bool {
            match self {
                Expr::Age(operator, age) => match *operator {
                    ">" => person.age > *age,
                    ">=" => person.age >= *age,
                    "<" => person.age < *age,
                    "<=" => person.age <= *age,
                    "=" => person.age == *age,
                    _ => person.age != *age,
                },
                Expr::Active(active) => person.active == *active,
                Expr::Name(name) => person.name.to_lowercase().contains(name),
                Expr::Word(word) => person.tags.iter().any(|tag| tag.contains(word)),
                Expr::Not(inner, _) => !inner.eval(person),
                Expr::And(left, right, _) => left.eval(person) && right.eval(person),
                Expr::Or(left, right) => left.eval(person) || right.eval(person),
            }
        }
    }

    fn leaf() -> impl Strategy<Value = Expr> {
        prop_oneof![
            (prop::sample::select(OPERATORS), 10..70i64)
                .prop_map(|(operator, age)| Expr::Age(operator, age)),
            any::<bool>().prop_map(Expr::Active),
            prop::sample::select(NAMES).prop_map(Expr::Name),
            prop::sample::select(WORDS).prop_map(Expr::Word),
        ]
    }

    fn arb_expr() -> impl Strategy<Value = Expr> {
        leaf().prop_recursive(4, 24, 2, |inner| {
            prop_oneof![
                (inner.clone(), any::<bool>())
                    .prop_map(|(expr, dash)| Expr::Not(Box::new(expr), dash)),
                (inner.clone(), inner.clone(), any::<bool>()).prop_map(
                    |(left, right, implicit)| Expr::And(Box::new(left), Box::new(right), implicit)
                ),
                (inner.clone(), inner)
                    .prop_map(|(left, right)| Expr::Or(Box::new(left), Box::new(right))),
            ]
        })
    }

    fn matching(query: &Query<Person>, people: &[Person]) -> Vec<&'static str> {
        query
            .apply(people)
            .expect("valid query")
            .map(|person| person.expect("evaluation").name)
            .collect()
    }

    proptest! {
        /// Parsed queries agree with a direct evaluation of the expression.
        #[test]
        fn queries_match_the_reference(expr in arb_expr()) {
            let engine = engine();
            let text = expr.render();
            let query = engine.parse(&text);
            prop_assert!(query.is_valid(), "{:?}: {:?}", text, query.errors());
            let people = people();
            prop_assert_eq!(matching(&query, &people), names_where(|person| expr.eval(person)));
        }

        /// Optimizing never changes which elements match.
        #[test]
        fn optimization_preserves_results(expr in arb_expr(), propagate in any::<bool>(), swap in any::<bool>()) {
            let engine = engine();
            let people = people();
            let mut query = engine.parse(&expr.render());
            let before = matching(&query, &people);
            query.optimize(propagate, swap);
            prop_assert_eq!(matching(&query, &people), before);
        }

        /// The identifier of a parsed graph parses back to an equivalent query.
        #[test]
        fn identifiers_round_trip(expr in arb_expr()) {
            let engine = engine();
            let people = people();
            let query = engine.parse(&expr.render());
            let identifier = query.identifier().expect("non-empty graph");
            let reparsed = engine.parse(&identifier);
            prop_assert!(reparsed.is_valid(), "{:?}: {:?}", identifier, reparsed.errors());
            prop_assert_eq!(matching(&reparsed, &people), matching(&query, &people));
        }
    }
}
