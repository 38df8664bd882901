#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use rox::report::ErrorReport;
    use rox::value::Value;
    use rox::{Lox, RunStatus};

    /// Output sink the test keeps a handle to after giving it away.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn lox() -> (Lox, SharedBuf) {
        let out = SharedBuf::default();
        (Lox::with_output(Box::new(out.clone())), out)
    }

    fn errors(report: &ErrorReport) -> Vec<String> {
        report.errors().iter().map(|e| e.to_string()).collect()
    }

    /// Run `source` on a fresh interpreter: (status, stdout, errors).
    fn run(source: &str) -> (RunStatus, String, Vec<String>) {
        let (mut lox, out) = lox();
        let status = lox.run(source);

        (status, out.contents(), errors(lox.report()))
    }

    fn output(source: &str) -> String {
        let (status, out, errors) = run(source);
        assert_eq!(status, RunStatus::Ok, "errors: {:?}", errors);
        out
    }

    fn runtime_error(source: &str) -> String {
        let (status, _, errors) = run(source);
        assert_eq!(status, RunStatus::RuntimeError);
        assert_eq!(errors.len(), 1);
        errors[0].clone()
    }

    #[test]
    fn test_interpreter_01_arithmetic() {
        assert_eq!(output("print 1 + 2;"), "3\n");
        assert_eq!(output("print -2 * 3 + 10 / 4;"), "-3.5\n");
        assert_eq!(output("print (1 + 2) * 3 > 8;"), "true\n");
    }

    #[test]
    fn test_interpreter_02_strings() {
        assert_eq!(output("print \"a\" + \"b\";"), "ab\n");

        let (status, out, errors) = run("print 1 + \"b\";");
        assert_eq!(status, RunStatus::RuntimeError);
        assert_eq!(out, "");
        assert_eq!(
            errors,
            vec!["Operands must be two numbers or two strings.\n[line 1]"]
        );
    }

    #[test]
    fn test_interpreter_03_truthiness_and_logic() {
        assert_eq!(
            output(
                "print !nil; print !0; print !\"\";
                 print nil or \"x\"; print 1 and 2; print false and undefined;"
            ),
            "true\nfalse\nfalse\nx\n2\nfalse\n"
        );
    }

    #[test]
    fn test_interpreter_04_equality() {
        assert_eq!(
            output(
                "class A {}
                 var a = A();
                 print 1 == 1; print \"a\" == \"a\"; print nil == false;
                 print A() == A(); print a == a; print nil == nil;"
            ),
            "true\ntrue\nfalse\nfalse\ntrue\ntrue\n"
        );
    }

    #[test]
    fn test_interpreter_05_control_flow() {
        assert_eq!(
            output(
                "var sum = 0;
                 for (var i = 1; i <= 4; i = i + 1) sum = sum + i;
                 print sum;
                 var n = 3;
                 while (n > 0) n = n - 1;
                 if (n == 0) print \"done\"; else print \"not done\";"
            ),
            "10\ndone\n"
        );
    }

    #[test]
    fn test_interpreter_06_recursion() {
        assert_eq!(
            output(
                "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
                 print fib(10);"
            ),
            "55\n"
        );
    }

    #[test]
    fn test_interpreter_07_counter_closure() {
        assert_eq!(
            output(
                "fun makeCounter() {
                   var i = 0;
                   fun count() { i = i + 1; print i; }
                   return count;
                 }
                 var counter = makeCounter();
                 counter();
                 counter();"
            ),
            "1\n2\n"
        );
    }

    #[test]
    fn test_interpreter_08_closure_ignores_later_shadowing() {
        assert_eq!(
            output(
                "var a = \"global\";
                 {
                   fun showA() { print a; }
                   showA();
                   var a = \"block\";
                   showA();
                 }"
            ),
            "global\nglobal\n"
        );
    }

    #[test]
    fn test_interpreter_09_display_forms() {
        assert_eq!(
            output(
                "fun f() {}
                 class P {}
                 print nil; print true; print 7 / 2; print 3.0;
                 print f; print clock; print P; print P(); print f();"
            ),
            "nil\ntrue\n3.5\n3\n<fn f>\n<native fn>\n<class P>\n<instance P>\nnil\n"
        );
    }

    #[test]
    fn test_interpreter_10_initializer_returns_instance() {
        assert_eq!(
            output(
                "class P { init(x) { this.x = x; return; } }
                 var p = P(3);
                 print p.x;
                 print p.init(4) == p;
                 print p.x;"
            ),
            "3\ntrue\n4\n"
        );
    }

    #[test]
    fn test_interpreter_11_bound_methods_keep_this() {
        assert_eq!(
            output(
                "class Cake {
                   taste() { print \"The \" + this.flavor + \" cake\"; }
                 }
                 var cake = Cake();
                 cake.flavor = \"chocolate\";
                 var taste = cake.taste;
                 taste();"
            ),
            "The chocolate cake\n"
        );
    }

    #[test]
    fn test_interpreter_12_super_targets_static_superclass() {
        assert_eq!(
            output(
                "class A { method() { print \"A method\"; } }
                 class B < A {
                   method() { print \"B method\"; }
                   test() { super.method(); }
                 }
                 class C < B {}
                 C().test();"
            ),
            "A method\n"
        );
    }

    #[test]
    fn test_interpreter_13_inherited_initializer() {
        assert_eq!(
            output(
                "class Base { init(n) { this.n = n; } }
                 class Derived < Base {}
                 print Derived(7).n;"
            ),
            "7\n"
        );
    }

    #[test]
    fn test_interpreter_14_return_unwinds_loops_and_blocks() {
        assert_eq!(
            output(
                "fun f() { while (true) { { if (true) return \"deep\"; } } }
                 print f();"
            ),
            "deep\n"
        );

        assert_eq!(
            output(
                "fun first(n) {
                   var i = 0;
                   while (true) { if (i == n) return i; i = i + 1; }
                 }
                 for (var k = 0; k < 3; k = k + 1) print first(k);
                 print \"after\";"
            ),
            "0\n1\n2\nafter\n"
        );
    }

    #[test]
    fn test_interpreter_15_fields_shadow_methods() {
        assert_eq!(
            output(
                "class A { m() { return 1; } }
                 class B < A {}
                 var a = A();
                 a.m = 2;
                 print a.m;
                 var b = B();
                 print b.m();
                 b.m = \"field\";
                 print b.m;
                 print B().m();"
            ),
            "2\n1\nfield\n1\n"
        );
    }

    #[test]
    fn test_interpreter_16_number_equality() {
        assert_eq!(
            output(
                "var nan = 0 / 0;
                 print nan == nan; print (0 / 0) == (0 / 0); print nan != nan;
                 print 0 == -0; print 1 == 1; print 0.1 + 0.2 == 0.3;"
            ),
            "true\ntrue\nfalse\nfalse\ntrue\nfalse\n"
        );
    }

    #[test]
    fn test_interpreter_17_number_display() {
        assert_eq!(
            output(
                "print 1 / 0; print -1 / 0; print 0 / 0;
                 print 1000000000000000000000; print 12345678; print 1234567;
                 print 0.0001; print 0.001; print 2.5; print -4;"
            ),
            "Infinity\n-Infinity\nNaN\n1.0E21\n1.2345678E7\n1234567\n1.0E-4\n0.001\n2.5\n-4\n"
        );
    }

    #[test]
    fn test_uninitialized_and_undefined_differ() {
        assert_eq!(
            runtime_error("var x; print x;"),
            "Uninitialized variable 'x'.\n[line 1]"
        );
        assert_eq!(
            runtime_error("print y;"),
            "Undefined variable 'y'.\n[line 1]"
        );
        assert_eq!(
            runtime_error("y = 1;"),
            "Undefined variable 'y'.\n[line 1]"
        );

        assert_eq!(output("var x; x = 2; print x;"), "2\n");
        assert_eq!(output("{ var x; x = 3; print x; }"), "3\n");
    }

    #[test]
    fn test_runtime_error_messages() {
        assert_eq!(
            runtime_error("fun f(a, b) {}\nf(1);"),
            "Expected 2 arguments but got 1.\n[line 2]"
        );
        assert_eq!(
            runtime_error("\"x\"();"),
            "Can only call functions and classes.\n[line 1]"
        );
        assert_eq!(
            runtime_error("class A {} A().nope;"),
            "Undefined property 'nope'.\n[line 1]"
        );
        assert_eq!(
            runtime_error("var n = 1; n.x;"),
            "Only instances have properties.\n[line 1]"
        );
        assert_eq!(
            runtime_error("var n = 1; n.x = 2;"),
            "Only instances have fields.\n[line 1]"
        );
        assert_eq!(
            runtime_error("var A = 1; class B < A {}"),
            "Superclass must be a class.\n[line 1]"
        );
        assert_eq!(
            runtime_error("print 1 < \"2\";"),
            "Operands must be numbers.\n[line 1]"
        );
        assert_eq!(
            runtime_error("class A { init(a) {} } A();"),
            "Expected 1 arguments but got 0.\n[line 1]"
        );
    }

    #[test]
    fn test_runtime_error_keeps_earlier_output() {
        let (mut lox, out) = lox();
        let status = lox.run("print 1;\nprint -\"a\";\nprint 2;");

        assert_eq!(status, RunStatus::RuntimeError);
        assert_eq!(out.contents(), "1\n");
        assert!(lox.report().had_runtime_error());
        assert_eq!(
            errors(lox.report()),
            vec!["Operand must be a number.\n[line 2]"]
        );
    }

    #[test]
    fn test_static_errors_prevent_execution() {
        let (status, out, errors) = run("print 1; print ;");
        assert_eq!(status, RunStatus::StaticError);
        assert_eq!(out, "");
        assert_eq!(errors, vec!["[line 1] Error at ';': Expect expression."]);

        let (mut lox, _) = lox();
        lox.run("print ;");
        assert!(!lox.report().had_runtime_error());

        let (status, out, _) = run("print 1; return 2;");
        assert_eq!(status, RunStatus::StaticError);
        assert_eq!(out, "");

        let (status, out, _) = run("print 1; @");
        assert_eq!(status, RunStatus::StaticError);
        assert_eq!(out, "");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Ok.exit_code(), 0);
        assert_eq!(RunStatus::StaticError.exit_code(), 65);
        assert_eq!(RunStatus::RuntimeError.exit_code(), 70);
    }

    #[test]
    fn test_globals_persist_between_runs() {
        let (mut lox, out) = lox();

        assert_eq!(lox.run("var a = 1;"), RunStatus::Ok);
        assert_eq!(lox.run("fun f() { var x = 2; return x + a; }"), RunStatus::Ok);
        assert_eq!(lox.run("{ var y = 3; print f() + y; }"), RunStatus::Ok);

        assert_eq!(out.contents(), "6\n");
    }

    #[test]
    fn test_closure_from_earlier_run_keeps_its_resolution() {
        let (mut lox, out) = lox();

        assert_eq!(
            lox.run(
                "fun make() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }
                 var inc = make();"
            ),
            RunStatus::Ok
        );

        for _ in 0..3 {
            assert_eq!(lox.run("{ var n = 100; print inc(); }"), RunStatus::Ok);
        }

        assert_eq!(out.contents(), "1\n2\n3\n");
    }

    #[test]
    fn test_errors_are_reset_for_each_run() {
        let (mut lox, out) = lox();

        assert_eq!(lox.run("print ;"), RunStatus::StaticError);
        assert_eq!(lox.report().errors().len(), 1);

        assert_eq!(lox.run("print 1;"), RunStatus::Ok);
        assert!(lox.report().errors().is_empty());
        assert_eq!(out.contents(), "1\n");
    }

    #[test]
    fn test_rerun_resolved_tree_after_reset() {
        let (mut lox, out) = lox();

        let statements = lox
            .compile("var a = 1; { var b = a + 1; print b; }")
            .expect("program compiles");

        assert_eq!(lox.execute(&statements), RunStatus::Ok);
        lox.interpreter_mut().reset_globals();
        assert_eq!(lox.execute(&statements), RunStatus::Ok);

        assert_eq!(out.contents(), "2\n2\n");

        lox.interpreter_mut().reset_globals();
        assert_eq!(lox.run("print a;"), RunStatus::RuntimeError);
        assert_eq!(lox.run("print clock() > 0;"), RunStatus::Ok);
        assert_eq!(out.contents(), "2\n2\ntrue\n");
    }

    fn double(args: &[Value]) -> Result<Value, String> {
        match &args[0] {
            Value::Number(n) => Ok(Value::Number(n * 2.0)),
            _ => Err("expected a number".to_owned()),
        }
    }

    #[test]
    fn test_custom_native() {
        let (mut lox, out) = lox();
        lox.interpreter_mut().define_native("double", 1, double);
        assert!(lox.interpreter_mut().globals().borrow().is_defined("double"));

        let status = lox.run("print double(21);\nprint double;\ndouble(\"x\");");

        assert_eq!(status, RunStatus::RuntimeError);
        assert_eq!(out.contents(), "42\n<native fn>\n");
        assert_eq!(
            errors(lox.report()),
            vec!["double: expected a number\n[line 3]"]
        );

        // Natives survive a reset.
        lox.interpreter_mut().reset_globals();
        assert_eq!(lox.run("print double(1);"), RunStatus::Ok);
    }
}
