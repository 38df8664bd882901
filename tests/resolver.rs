#[cfg(test)]
mod resolver_tests {
    use pretty_assertions::assert_eq;

    use rox::interpreter::Locals;
    use rox::parser::Parser;
    use rox::report::{ErrorReport, Reporter};
    use rox::resolver::Resolver;
    use rox::scanner::scan;

    fn resolve(source: &str) -> (Locals, Vec<String>) {
        let mut report = ErrorReport::new();
        let tokens = scan(source, &mut report);
        let statements = Parser::new(&tokens, &mut report).parse();

        assert!(!report.had_error(), "source must parse: {:?}", report.errors());

        let mut resolver = Resolver::new(&mut report);
        resolver.resolve(&statements);
        let locals = resolver.into_locals();

        let errors = report.errors().iter().map(|e| e.to_string()).collect();

        (locals, errors)
    }

    fn errors(source: &str) -> Vec<String> {
        resolve(source).1
    }

    #[test]
    fn test_resolver_01_locals_get_distances_globals_do_not() {
        let (locals, errors) = resolve("var g = 1; { var a = 1; { print a; print g; } }");

        assert!(errors.is_empty());
        assert_eq!(locals.values().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_resolver_02_closure_sees_declaration_scope() {
        let (locals, errors) = resolve(
            "{
                var a = 1;
                fun f() { return a; }
             }",
        );

        assert!(errors.is_empty());
        // `a` inside `f`: out of the function scope, into the block.
        assert_eq!(locals.values().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_resolver_03_global_redeclaration_is_allowed() {
        assert!(errors("var a = 1; var a = 2;").is_empty());
    }

    #[test]
    fn test_duplicate_local() {
        assert_eq!(
            errors("{ var a = 1; var a = 2; }"),
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn test_duplicate_parameter() {
        assert_eq!(
            errors("fun f(a, a) {}"),
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn test_read_in_own_initializer() {
        assert_eq!(
            errors("var a = 1; { var a = a; }"),
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn test_return_at_top_level() {
        assert_eq!(
            errors("return 1;"),
            vec!["[line 1] Error at 'return': Can't return from top-level code."]
        );
    }

    #[test]
    fn test_return_value_from_initializer() {
        assert_eq!(
            errors("class A { init() { return 1; } }"),
            vec!["[line 1] Error at 'return': Can't return a value from an initializer."]
        );

        assert!(errors("class A { init() { return; } }").is_empty());
    }

    #[test]
    fn test_this_outside_class() {
        assert_eq!(
            errors("print this;"),
            vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
        );

        assert_eq!(
            errors("fun f() { return this; }"),
            vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
        );
    }

    #[test]
    fn test_super_misuse() {
        assert_eq!(
            errors("fun f() { super.g(); }"),
            vec!["[line 1] Error at 'super': Can't use 'super' outside of a class."]
        );

        assert_eq!(
            errors("class A { f() { super.f(); } }"),
            vec!["[line 1] Error at 'super': Can't use 'super' in a class with no superclass."]
        );

        assert!(errors("class A {} class B < A { f() { super.f(); } }").is_empty());
    }

    #[test]
    fn test_class_inheriting_from_itself() {
        assert_eq!(
            errors("class A < A {}"),
            vec!["[line 1] Error at 'A': A class can't inherit from itself."]
        );
    }

    #[test]
    fn test_every_error_is_reported() {
        assert_eq!(
            errors("return 1;\nprint this;\n{ var b; var b; }"),
            vec![
                "[line 1] Error at 'return': Can't return from top-level code.",
                "[line 2] Error at 'this': Can't use 'this' outside of a class.",
                "[line 3] Error at 'b': Already a variable with this name in this scope.",
            ]
        );
    }
}
