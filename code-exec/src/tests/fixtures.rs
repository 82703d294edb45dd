/// Programs in the built-in scripting language
pub mod script_samples {
    pub const FIBONACCI: &str = r#"
fn fibonacci(n) {
    if (n <= 1) { return n; }
    return fibonacci(n - 1) + fibonacci(n - 2);
}
println(fibonacci(10));
"#;

    pub const UNBALANCED_PARENS: &str = "let x = (1 + 2;";
    pub const STRAY_CHARACTER: &str = "let x = 1 § 2;";
    pub const INFINITE_LOOP: &str = "while true { }";
    pub const DIVISION_BY_ZERO: &str = "println(\"before\"); let x = 1 / 0;";
    pub const PRINT_FOREVER: &str = "while true { println(\"spam spam spam\"); }";
    pub const GROW_STRING: &str = r#"
let s = "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";
while true { s = s + s; }
"#;
    pub const FOR_AND_ARRAYS: &str = r#"
let squares = [];
for (let i = 1; i <= 5; i = i + 1) {
    squares = push(squares, i * i);
}
println(squares, len(squares), squares[4]);
"#;

    /// Unbounded recursion whose every frame re-enters `depth` nested
    /// negations before the next call.
    pub fn nested_recursion(depth: usize) -> String {
        format!("fn f(n) {{ return {}f(n + 1); }} f(0);", "-".repeat(depth))
    }
}

/// Test code samples for external languages
pub mod code_samples {
    pub const PYTHON_HELLO: &str = r#"print("Hello from Python!")"#;
    pub const JS_HELLO: &str = r#"console.log('Hello from JavaScript!')"#;
    pub const GO_HELLO: &str = r#"package main

import "fmt"

func main() {
    fmt.Println("Hello from Go!")
}"#;
    pub const RUST_HELLO: &str = r#"
        fn main() {
            println!("Hello from Rust!");
        }
    "#;
    pub const RUST_WITHOUT_MAIN: &str = r#"println!("Hello from Rust!");"#;
    pub const C_HELLO: &str = r#"#include <stdio.h>

int main(void) {
    printf("Hello from C!\n");
    return 0;
}"#;
    pub const CPP_HELLO: &str = r#"#include <iostream>

int main() {
    std::cout << "Hello from C++!" << std::endl;
    return 0;
}"#;
}

/// Code that each toolchain rejects before running
pub mod broken_samples {
    pub const PYTHON_SYNTAX: &str = "print((1)";
    pub const PYTHON_LEXICAL: &str = "x = 1 § 2";
    pub const JS_SYNTAX: &str = "console.log((1);";
    pub const RUST_SYNTAX: &str = "fn main() { let x = ; }";
    pub const C_SYNTAX: &str = "int main(void) { return 0 }";
    pub const CPP_SYNTAX: &str = "int main() { return 0 }";
    pub const GO_SYNTAX: &str = "package main\n\nfunc main() {\n";
}

/// Test code samples for specific scenarios
pub mod test_scenarios {
    pub const PYTHON_MULTILINE: &str = r#"def factorial(n):
    if n <= 1:
        return 1
    return n * factorial(n - 1)

result = factorial(5)
print(f"Factorial of 5 is {result}")"#;

    pub const PYTHON_ZERO_DIVISION: &str = r#"print("before")
print(1 / 0)"#;

    pub const PYTHON_RAISES_SYNTAX_ERROR: &str = r#"print("before")
exec("x = (")"#;

    pub const PYTHON_SLEEP: &str = r#"import time
time.sleep(30)"#;

    pub const PYTHON_RESOURCE_HEAVY: &str = r#"big = bytearray(512 * 1024 * 1024)
print(len(big))"#;

    pub const JS_BAD_JSON: &str = r#"
        console.log('before');
        JSON.parse('{');
    "#;

    pub const JS_WITH_TIMEOUT: &str = r#"
        setTimeout(() => {
            console.log('This should not print due to timeout');
        }, 60000);
    "#;

    pub const JS_THROW: &str = r#"throw new Error("boom");"#;

    pub const C_CRASH: &str = r#"#include <stdlib.h>

int main(void) {
    abort();
}"#;
}
