//! HTML rendering. Pages are assembled from plain format strings; every
//! user-supplied value goes through `escape` on its way into markup.

use crate::admin::RankedStudent;
use crate::models::StudentRow;
use crate::session::{FlashKind, FlashMessage};

const STYLE: &str = "\
body{font-family:Arial,sans-serif;max-width:960px;margin:40px auto;padding:0 16px;}\
.flash{padding:10px 14px;border-radius:4px;margin:8px 0;}\
.flash.success{background:#d4edda;color:#155724;}\
.flash.error{background:#f8d7da;color:#721c24;}\
table{border-collapse:collapse;width:100%;margin:16px 0;}\
th,td{border-bottom:1px solid #ddd;padding:8px;text-align:left;vertical-align:top;}\
form.inline{display:inline;}\
label{display:block;margin:8px 0 4px;font-weight:bold;}\
input{padding:6px;}\
fieldset{margin:16px 0;border:1px solid #ddd;border-radius:4px;}\
button{background:#007bff;color:white;border:none;border-radius:4px;padding:8px 14px;cursor:pointer;margin:4px 0;}";

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn flash_block(flash: &[FlashMessage]) -> String {
    flash
        .iter()
        .map(|msg| {
            let class = match msg.kind {
                FlashKind::Success => "flash success",
                FlashKind::Error => "flash error",
            };
            format!("<div class=\"{}\">{}</div>", class, escape(&msg.message))
        })
        .collect()
}

fn layout(title: &str, flash: &[FlashMessage], body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title>\
         <style>{}</style></head><body>{}{}</body></html>",
        escape(title),
        STYLE,
        flash_block(flash),
        body,
    )
}

pub fn index(flash: &[FlashMessage]) -> String {
    layout(
        "College Counseling Portal",
        flash,
        "<h1>College Counseling Portal</h1>\
         <p>Students submit their marks and branch preferences here; the\
         counseling office ranks applicants, allocates branches and issues\
         offer letters once payment is verified.</p>\
         <h2>Students</h2>\
         <p><a href=\"/student/login\">Login</a> | <a href=\"/student/signup\">Sign up</a></p>\
         <h2>Administrators</h2>\
         <p><a href=\"/admin/login\">Login</a> | <a href=\"/admin/signup\">Sign up</a></p>",
    )
}

pub fn student_signup(flash: &[FlashMessage]) -> String {
    layout(
        "Student Signup",
        flash,
        "<h1>Student Signup</h1>\
         <form method=\"post\" action=\"/student/signup\">\
         <label for=\"name\">Name</label><input id=\"name\" name=\"name\" required>\
         <label for=\"email\">Email</label><input id=\"email\" name=\"email\" type=\"email\" required>\
         <label for=\"password\">Password</label><input id=\"password\" name=\"password\" type=\"password\" required>\
         <label for=\"phone\">Phone</label><input id=\"phone\" name=\"phone\" required>\
         <button type=\"submit\">Sign up</button></form>\
         <p><a href=\"/student/login\">Already registered? Login</a></p>",
    )
}

pub fn student_login(flash: &[FlashMessage]) -> String {
    layout(
        "Student Login",
        flash,
        "<h1>Student Login</h1>\
         <form method=\"post\" action=\"/student/login\">\
         <label for=\"email\">Email</label><input id=\"email\" name=\"email\" type=\"email\" required>\
         <label for=\"password\">Password</label><input id=\"password\" name=\"password\" type=\"password\" required>\
         <button type=\"submit\">Login</button></form>\
         <p><a href=\"/student/signup\">New here? Sign up</a></p>",
    )
}

pub fn admin_signup(flash: &[FlashMessage]) -> String {
    layout(
        "Admin Signup",
        flash,
        "<h1>Admin Signup</h1>\
         <form method=\"post\" action=\"/admin/signup\">\
         <label for=\"name\">Name</label><input id=\"name\" name=\"name\" required>\
         <label for=\"email\">Email</label><input id=\"email\" name=\"email\" type=\"email\" required>\
         <label for=\"password\">Password</label><input id=\"password\" name=\"password\" type=\"password\" required>\
         <button type=\"submit\">Create admin</button></form>\
         <p><a href=\"/admin/login\">Already an admin? Login</a></p>",
    )
}

pub fn admin_login(flash: &[FlashMessage]) -> String {
    layout(
        "Admin Login",
        flash,
        "<h1>Admin Login</h1>\
         <form method=\"post\" action=\"/admin/login\">\
         <label for=\"email\">Email</label><input id=\"email\" name=\"email\" type=\"email\" required>\
         <label for=\"password\">Password</label><input id=\"password\" name=\"password\" type=\"password\" required>\
         <button type=\"submit\">Login</button></form>",
    )
}

pub fn student_dashboard(student: &StudentRow, flash: &[FlashMessage]) -> String {
    let hs = student.highschool();
    let plus2 = student.plus2();

    let allocation = match student.allocated_branch.as_deref() {
        Some(branch) => format!(
            "<p>Allocated branch: <strong>{}</strong>{}</p>{}",
            escape(branch),
            if student.accepted_allocation {
                " (accepted)"
            } else {
                ""
            },
            if student.accepted_allocation {
                String::new()
            } else {
                "<form method=\"post\" action=\"/student/accept_allocation\">\
                 <button type=\"submit\">Accept this allocation</button></form>"
                    .to_owned()
            },
        ),
        None => "<p>No branch allocated yet.</p>".to_owned(),
    };

    let payment = match student.payment_receipt.as_deref() {
        Some(_) if student.payment_verified => "<p>Payment receipt uploaded and verified.</p>",
        Some(_) => "<p>Payment receipt uploaded, awaiting verification.</p>",
        None => "<p>No payment receipt uploaded.</p>",
    };

    let offer = if student.offer_generated {
        "<p><a href=\"/student/offer\">View your offer letter</a></p>"
    } else {
        ""
    };

    let body = format!(
        "<h1>Welcome, {name}</h1>\
         <p>{email} | {phone}</p>\
         {allocation}{payment}{offer}\
         <h2>Your Details</h2>\
         <form method=\"post\" action=\"/student/details\">\
         <label for=\"name\">Name</label><input id=\"name\" name=\"name\" value=\"{name}\">\
         <label for=\"phone\">Phone</label><input id=\"phone\" name=\"phone\" value=\"{phone}\">\
         <fieldset><legend>High School Marks</legend>\
         <label for=\"hs_math\">Math</label><input id=\"hs_math\" name=\"hs_math\" value=\"{hs_math}\">\
         <label for=\"hs_science\">Science</label><input id=\"hs_science\" name=\"hs_science\" value=\"{hs_science}\">\
         <label for=\"hs_english\">English</label><input id=\"hs_english\" name=\"hs_english\" value=\"{hs_english}\">\
         <label for=\"hs_hindi\">Hindi</label><input id=\"hs_hindi\" name=\"hs_hindi\" value=\"{hs_hindi}\">\
         </fieldset>\
         <fieldset><legend>Plus Two Marks</legend>\
         <label for=\"plus_physics\">Physics</label><input id=\"plus_physics\" name=\"plus_physics\" value=\"{p_physics}\">\
         <label for=\"plus_chem\">Chemistry</label><input id=\"plus_chem\" name=\"plus_chem\" value=\"{p_chem}\">\
         <label for=\"plus_math\">Math</label><input id=\"plus_math\" name=\"plus_math\" value=\"{p_math}\">\
         </fieldset>\
         <fieldset><legend>Branch Preferences</legend>\
         <label for=\"choice1\">First choice</label><input id=\"choice1\" name=\"choice1\" value=\"{choice1}\">\
         <label for=\"choice2\">Second choice</label><input id=\"choice2\" name=\"choice2\" value=\"{choice2}\">\
         </fieldset>\
         <button type=\"submit\">Save details</button></form>\
         <h2>Payment Receipt</h2>\
         <form method=\"post\" action=\"/student/upload_receipt\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"receipt\">\
         <button type=\"submit\">Upload receipt</button></form>\
         <p><a href=\"/student/logout\">Logout</a></p>",
        name = escape(&student.name),
        email = escape(&student.email),
        phone = escape(&student.phone),
        allocation = allocation,
        payment = payment,
        offer = offer,
        hs_math = hs.math,
        hs_science = hs.science,
        hs_english = hs.english,
        hs_hindi = hs.hindi,
        p_physics = plus2.physics,
        p_chem = plus2.chemistry,
        p_math = plus2.math,
        choice1 = escape(student.branch_choice1.as_deref().unwrap_or("")),
        choice2 = escape(student.branch_choice2.as_deref().unwrap_or("")),
    );
    layout("Student Dashboard", flash, &body)
}

pub fn admin_dashboard(admin_name: &str, ranked: &[RankedStudent], flash: &[FlashMessage]) -> String {
    let rows: String = ranked
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let student = &entry.row;
            let receipt = match student.payment_receipt.as_deref() {
                Some(_) => format!(
                    "<a href=\"/admin/receipt/{}\">receipt</a>{}",
                    student.id,
                    if student.payment_verified {
                        " (verified)"
                    } else {
                        ""
                    },
                ),
                None => "none".to_owned(),
            };
            format!(
                "<tr><td>{rank}</td><td>{name}</td><td>{email}</td><td>{phone}</td>\
                 <td>{physics}</td><td>{chemistry}</td><td>{math}</td><td><strong>{total}</strong></td>\
                 <td>{choice1} / {choice2}</td>\
                 <td>{allocated}{accepted}</td>\
                 <td>{receipt}</td>\
                 <td><form class=\"inline\" method=\"post\" action=\"/admin/allocate\">\
                 <input type=\"hidden\" name=\"student_id\" value=\"{id}\">\
                 <input name=\"branch\" placeholder=\"Branch\" size=\"8\">\
                 <button type=\"submit\">Allocate</button></form> \
                 <form class=\"inline\" method=\"post\" action=\"/admin/verify_payment\">\
                 <input type=\"hidden\" name=\"student_id\" value=\"{id}\">\
                 <button type=\"submit\">Verify payment</button></form></td></tr>",
                rank = index + 1,
                name = escape(&student.name),
                email = escape(&student.email),
                phone = escape(&student.phone),
                physics = entry.plus2.physics,
                chemistry = entry.plus2.chemistry,
                math = entry.plus2.math,
                total = entry.total,
                choice1 = escape(student.branch_choice1.as_deref().unwrap_or("-")),
                choice2 = escape(student.branch_choice2.as_deref().unwrap_or("-")),
                allocated = escape(student.allocated_branch.as_deref().unwrap_or("Not allocated")),
                accepted = if student.accepted_allocation {
                    " (accepted)"
                } else {
                    ""
                },
                receipt = receipt,
                id = student.id,
            )
        })
        .collect();

    let body = format!(
        "<h1>Admin Dashboard</h1>\
         <p>Signed in as {admin}. Students ranked by plus-two total.</p>\
         <table><thead><tr><th>#</th><th>Name</th><th>Email</th><th>Phone</th>\
         <th>Physics</th><th>Chemistry</th><th>Math</th><th>Total</th>\
         <th>Choices</th><th>Allocated</th><th>Receipt</th><th>Actions</th></tr></thead>\
         <tbody>{rows}</tbody></table>\
         <p><a href=\"/admin/logout\">Logout</a></p>",
        admin = escape(admin_name),
        rows = rows,
    );
    layout("Admin Dashboard", flash, &body)
}

pub fn not_found(path: &str) -> String {
    layout(
        "Not Found",
        &[],
        &format!(
            "<h1>Not Found</h1><p>Invalid path: {}</p><p><a href=\"/\">Back to the portal</a></p>",
            escape(path)
        ),
    )
}

pub fn error_page() -> String {
    layout(
        "Error",
        &[],
        "<h1>Something went wrong</h1>\
         <p>The request could not be completed. Please try again.</p>\
         <p><a href=\"/\">Back to the portal</a></p>",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(
            escape(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape("O'Neil & Co"), "O&#39;Neil &amp; Co");
    }

    #[test]
    fn flash_messages_render_with_their_kind() {
        let flash = vec![
            FlashMessage {
                kind: FlashKind::Success,
                message: "Details saved.".to_owned(),
            },
            FlashMessage {
                kind: FlashKind::Error,
                message: "No file uploaded.".to_owned(),
            },
        ];
        let block = flash_block(&flash);
        assert!(block.contains("flash success"));
        assert!(block.contains("Details saved."));
        assert!(block.contains("flash error"));
        assert!(block.contains("No file uploaded."));
    }

    #[test]
    fn login_pages_render_their_forms() {
        assert!(student_login(&[]).contains("action=\"/student/login\""));
        assert!(admin_login(&[]).contains("action=\"/admin/login\""));
    }
}
